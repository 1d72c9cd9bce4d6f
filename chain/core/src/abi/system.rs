//! ABI of the system contract, used when the system account has no stored
//! definition of its own.

use crate::abi::def::AbiDef;
use crate::abi::AbiError;

const SYSTEM_ABI_JSON: &str = include_str!("system_abi.json");

pub fn system_abi() -> Result<AbiDef, AbiError> {
    AbiDef::from_json(SYSTEM_ABI_JSON)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::serializer::AbiSerializer;
    use crate::abi::stream::AbiWriter;
    use crate::name::Name;

    #[test]
    fn test_system_abi_is_consistent() {
        let abi = system_abi().unwrap();
        let serializer = AbiSerializer::new(&abi).unwrap();
        assert_eq!(serializer.action_type(Name::from_str_unchecked("newaccount")), Some("newaccount"));
        assert_eq!(serializer.action_type(Name::from_str_unchecked("transfer")), None);
    }

    #[test]
    fn test_decode_voteproducer() {
        let serializer = AbiSerializer::new(&system_abi().unwrap()).unwrap();

        let mut w = AbiWriter::new();
        w.write_u64(Name::from_str_unchecked("alice").as_u64());
        w.write_u64(0);
        w.write_varuint32(2);
        w.write_u64(Name::from_str_unchecked("prod.a").as_u64());
        w.write_u64(Name::from_str_unchecked("prod.b").as_u64());

        let value = serializer
            .decode_action(Name::from_str_unchecked("voteproducer"), &w.into_bytes())
            .unwrap();
        assert_eq!(value["voter"], "alice");
        assert_eq!(value["proxy"], "");
        assert_eq!(value["producers"], serde_json::json!(["prod.a", "prod.b"]));
    }
}
