use chain_core::{BlockTrace, IrreversibleBlock};
use serde::{Deserialize, Serialize};

/// Unit of work handed from the node callbacks to the writer thread.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainEvent {
    Applied(BlockTrace),
    Irreversible(IrreversibleBlock),
}

impl ChainEvent {
    pub fn block_num(&self) -> u32 {
        match self {
            ChainEvent::Applied(block) => block.block_num,
            ChainEvent::Irreversible(block) => block.block_num,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_externally_tagged_json() {
        let event: ChainEvent =
            serde_json::from_str(r#"{"irreversible": {"block_num": 9, "block_id": "09"}}"#).unwrap();
        assert_eq!(event.block_num(), 9);
        assert!(matches!(event, ChainEvent::Irreversible(_)));

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.starts_with(r#"{"irreversible":"#));
    }
}
