//! Action decoding and projection into derived tables

use std::sync::Arc;

use chain_core::abi::{system_abi, AbiDef, AbiSerializer};
use chain_core::{Action, Asset, Name, PublicKey, SYSTEM_ACCOUNT};
use serde::Deserialize;
use serde_json::Value;
use sqlx::{AnyConnection, Connection};
use tracing::{debug, warn};

use crate::cache::AbiCache;
use crate::database::Database;
use crate::error::{Result, SqlDbError};
use crate::tables::actions::NewAction;

/// Where an action sits in the chain.
#[derive(Clone, Copy, Debug)]
pub struct ActionContext<'a> {
    pub transaction_id: &'a str,
    /// Unix seconds of the containing block.
    pub timestamp: i64,
    /// Position within the transaction, starting at zero.
    pub seq: u32,
}

/// Actions that update derived tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionKind {
    Issue,
    Transfer,
    DelegateBw,
    VoteProducer,
    SetAbi,
    NewAccount,
}

/// (action name, only when executed by the system account, kind)
const ACTION_KINDS: &[(Name, bool, ActionKind)] = &[
    (Name::from_str_unchecked("issue"), false, ActionKind::Issue),
    (Name::from_str_unchecked("transfer"), false, ActionKind::Transfer),
    (Name::from_str_unchecked("delegatebw"), true, ActionKind::DelegateBw),
    (Name::from_str_unchecked("voteproducer"), true, ActionKind::VoteProducer),
    (Name::from_str_unchecked("setabi"), true, ActionKind::SetAbi),
    (Name::from_str_unchecked("newaccount"), true, ActionKind::NewAccount),
];

impl ActionKind {
    pub fn resolve(account: Name, action: Name) -> Option<Self> {
        let is_system = account == SYSTEM_ACCOUNT;
        ACTION_KINDS
            .iter()
            .find(|(name, system_only, _)| *name == action && (is_system || !*system_only))
            .map(|(_, _, kind)| *kind)
    }
}

#[derive(Debug)]
pub enum ActionOutcome {
    /// The executing account has no ABI; nothing was written.
    NoAbi,
    /// The action row was stored and its projection, if any, applied.
    Applied { action_id: i64, kind: Option<ActionKind> },
    /// The action row was stored but updating the derived tables failed.
    ProjectionFailed { action_id: i64, kind: ActionKind, error: SqlDbError },
}

#[derive(Deserialize)]
struct IssueArgs {
    to: Name,
    quantity: Asset,
}

#[derive(Deserialize)]
struct TransferArgs {
    from: Name,
    to: Name,
    quantity: Asset,
}

#[derive(Deserialize)]
struct DelegateBwArgs {
    receiver: Name,
    stake_net_quantity: Asset,
    stake_cpu_quantity: Asset,
}

#[derive(Deserialize)]
struct VoteProducerArgs {
    voter: Name,
    #[serde(default)]
    producers: Vec<Name>,
}

#[derive(Deserialize)]
struct SetAbiArgs {
    account: Name,
    #[serde(with = "hex::serde")]
    abi: Vec<u8>,
}

#[derive(Deserialize)]
struct KeyWeight {
    key: PublicKey,
}

#[derive(Deserialize)]
struct Authority {
    #[serde(default)]
    keys: Vec<KeyWeight>,
}

#[derive(Deserialize)]
struct NewAccountArgs {
    name: Name,
    owner: Authority,
    active: Authority,
}

pub struct ActionIndexer {
    database: Arc<Database>,
    cache: AbiCache,
}

impl ActionIndexer {
    pub fn new(database: Arc<Database>, abi_cache_size: usize) -> Self {
        Self {
            database,
            cache: AbiCache::new(abi_cache_size),
        }
    }

    /// Stores `action` with its authorizations and applies its projection.
    ///
    /// Errors are returned for ABI or payload problems, which callers treat
    /// as a reason to skip the action, and for storage failures while writing
    /// the action row. Projection failures are reported in the outcome.
    pub async fn index(&self, action: &Action, ctx: &ActionContext<'_>) -> Result<ActionOutcome> {
        let Some(serializer) = self.serializer(action.account).await? else {
            debug!("No ABI for {}, skipping action {}", action.account, action.name);
            return Ok(ActionOutcome::NoAbi);
        };

        let data = serializer.decode_action(action.name, &action.data)?;
        let json = serde_json::to_string(&data)?;

        let tables = self.database.tables();
        let mut conn = self.database.acquire().await;

        let mut tx = conn.begin().await?;
        let action_id = tables
            .actions
            .add(
                &mut tx,
                &NewAction {
                    transaction_id: ctx.transaction_id,
                    account: action.account,
                    name: action.name,
                    seq: ctx.seq,
                    created_at: ctx.timestamp,
                    data: &json,
                },
            )
            .await?;
        for level in &action.authorization {
            tables.actions.add_authorization(&mut tx, action_id, level).await?;
        }
        tx.commit().await?;

        let Some(kind) = ActionKind::resolve(action.account, action.name) else {
            return Ok(ActionOutcome::Applied { action_id, kind: None });
        };

        match self.project(&mut conn, kind, data, ctx).await {
            Ok(()) => {
                debug!("Applied {:?} from {}::{} (action {})", kind, action.account, action.name, action_id);
                Ok(ActionOutcome::Applied { action_id, kind: Some(kind) })
            }
            Err(error) => {
                warn!("Failed to apply {:?} for action {} in {}: {}", kind, action_id, ctx.transaction_id, error);
                Ok(ActionOutcome::ProjectionFailed { action_id, kind, error })
            }
        }
    }

    /// Cached serializer, else the stored ABI, else the built-in one for the
    /// system account.
    async fn serializer(&self, account: Name) -> Result<Option<Arc<AbiSerializer>>> {
        if let Some(serializer) = self.cache.get(account) {
            return Ok(Some(serializer));
        }

        let stored = {
            let mut conn = self.database.acquire().await;
            self.database.tables().accounts.abi(&mut conn, account).await?
        };
        let abi = match stored {
            Some(json) => AbiDef::from_json(&json)?,
            None if account == SYSTEM_ACCOUNT => system_abi()?,
            None => return Ok(None),
        };

        let serializer = Arc::new(AbiSerializer::new(&abi)?);
        self.cache.insert(account, serializer.clone());
        Ok(Some(serializer))
    }

    /// Applies one projection in its own database transaction.
    async fn project(&self, conn: &mut AnyConnection, kind: ActionKind, data: Value, ctx: &ActionContext<'_>) -> Result<()> {
        let tables = self.database.tables();
        let mut tx = conn.begin().await?;
        let mut replaced_abi = None;

        match kind {
            ActionKind::Issue => {
                let args: IssueArgs = serde_json::from_value(data)?;
                tables.tokens.credit(&mut tx, args.to, &args.quantity).await?;
            }
            ActionKind::Transfer => {
                let args: TransferArgs = serde_json::from_value(data)?;
                tables.tokens.credit(&mut tx, args.to, &args.quantity).await?;
                tables.tokens.debit(&mut tx, args.from, &args.quantity).await?;
            }
            ActionKind::DelegateBw => {
                let args: DelegateBwArgs = serde_json::from_value(data)?;
                tables
                    .stakes
                    .upsert(&mut tx, args.receiver, &args.stake_cpu_quantity, &args.stake_net_quantity)
                    .await?;
            }
            ActionKind::VoteProducer => {
                let args: VoteProducerArgs = serde_json::from_value(data)?;
                tables.votes.upsert(&mut tx, args.voter, &args.producers).await?;
            }
            ActionKind::SetAbi => {
                let args: SetAbiArgs = serde_json::from_value(data)?;
                let json = if args.abi.is_empty() {
                    None
                } else {
                    Some(AbiDef::unpack(&args.abi)?.to_json()?)
                };
                tables.accounts.set_abi(&mut tx, args.account, json.as_deref(), ctx.timestamp).await?;
                replaced_abi = Some(args.account);
            }
            ActionKind::NewAccount => {
                let args: NewAccountArgs = serde_json::from_value(data)?;
                tables.accounts.add(&mut tx, args.name, ctx.timestamp).await?;
                for (permission, authority) in [("owner", &args.owner), ("active", &args.active)] {
                    for key_weight in &authority.keys {
                        tables
                            .accounts
                            .add_key(&mut tx, args.name, &key_weight.key.to_string(), permission)
                            .await?;
                    }
                }
            }
        }

        tx.commit().await?;
        if let Some(account) = replaced_abi {
            self.cache.invalidate(account);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_core::abi::{ActionDef, FieldDef, StructDef, TypeDef};
    use chain_core::{PermissionLevel, SymbolCode};
    use serde_json::json;
    use sqlx::Row;
    use tempfile::{tempdir, TempDir};

    const TRX: &str = "aa01";
    const TIMESTAMP: i64 = 1_527_854_400;

    fn name(s: &str) -> Name {
        s.parse().unwrap()
    }

    fn ctx(seq: u32) -> ActionContext<'static> {
        ActionContext { transaction_id: TRX, timestamp: TIMESTAMP, seq }
    }

    fn token_abi() -> AbiDef {
        let field = |name: &str, type_name: &str| FieldDef { name: name.into(), type_name: type_name.into() };
        let declare = |name: &str| ActionDef {
            name: Name::from_str_unchecked(name),
            type_name: name.into(),
            ricardian_contract: String::new(),
        };
        AbiDef {
            version: "eosio::abi/1.1".into(),
            types: vec![TypeDef { new_type_name: "account_name".into(), type_name: "name".into() }],
            structs: vec![
                StructDef {
                    name: "issue".into(),
                    base: String::new(),
                    fields: vec![field("to", "account_name"), field("quantity", "asset"), field("memo", "string")],
                },
                StructDef {
                    name: "transfer".into(),
                    base: String::new(),
                    fields: vec![
                        field("from", "account_name"),
                        field("to", "account_name"),
                        field("quantity", "asset"),
                        field("memo", "string"),
                    ],
                },
                StructDef { name: "open".into(), base: String::new(), fields: vec![field("owner", "account_name")] },
            ],
            actions: vec![declare("issue"), declare("transfer"), declare("open")],
            ..Default::default()
        }
    }

    async fn setup() -> (TempDir, Arc<Database>, ActionIndexer) {
        let temp_dir = tempdir().unwrap();
        let uri = format!("sqlite://{}?mode=rwc", temp_dir.path().join("actions.db").display());
        let db = Arc::new(Database::connect(&uri).await.unwrap());
        db.ensure_schema().await.unwrap();

        {
            let mut conn = db.acquire().await;
            sqlx::query(
                "INSERT INTO blocks (block_number, block_id, prev_block_id, producer, timestamp, num_transactions) \
                 VALUES (1, '01', '00', 'eosio', CURRENT_TIMESTAMP, 1)",
            )
            .execute(&mut *conn)
            .await
            .unwrap();
            sqlx::query(
                "INSERT INTO transactions (id, block_id, ref_block_num, ref_block_prefix, expiration, pending, num_actions) \
                 VALUES ($1, 1, 0, 0, CURRENT_TIMESTAMP, TRUE, 1)",
            )
            .bind(TRX)
            .execute(&mut *conn)
            .await
            .unwrap();

            let token = name("eosio.token");
            let tables = db.tables();
            tables.accounts.add(&mut conn, token, TIMESTAMP).await.unwrap();
            let abi = token_abi().to_json().unwrap();
            tables.accounts.set_abi(&mut conn, token, Some(&abi), TIMESTAMP).await.unwrap();
        }

        let indexer = ActionIndexer::new(db.clone(), 16);
        (temp_dir, db, indexer)
    }

    fn action(account: &str, action_name: &str, abi: &AbiDef, args: Value) -> Action {
        let serializer = AbiSerializer::new(abi).unwrap();
        Action {
            account: name(account),
            name: name(action_name),
            authorization: vec![PermissionLevel::new(name(account), name("active"))],
            data: serializer.encode_action(name(action_name), &args).unwrap(),
        }
    }

    fn token_action(action_name: &str, args: Value) -> Action {
        action("eosio.token", action_name, &token_abi(), args)
    }

    fn system_action(action_name: &str, args: Value) -> Action {
        action("eosio", action_name, &system_abi().unwrap(), args)
    }

    async fn balance(db: &Database, account: &str) -> Option<i64> {
        let mut conn = db.acquire().await;
        let tok: SymbolCode = "TOK".parse().unwrap();
        db.tables().tokens.balance(&mut conn, name(account), tok).await.unwrap()
    }

    async fn count(db: &Database, table: &str) -> i64 {
        let mut conn = db.acquire().await;
        sqlx::query(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&mut *conn)
            .await
            .unwrap()
            .get::<i64, _>(0)
    }

    #[test]
    fn test_kind_lookup() {
        let token = name("eosio.token");
        assert_eq!(ActionKind::resolve(token, name("transfer")), Some(ActionKind::Transfer));
        assert_eq!(ActionKind::resolve(SYSTEM_ACCOUNT, name("issue")), Some(ActionKind::Issue));
        assert_eq!(ActionKind::resolve(SYSTEM_ACCOUNT, name("setabi")), Some(ActionKind::SetAbi));
        assert_eq!(ActionKind::resolve(token, name("setabi")), None);
        assert_eq!(ActionKind::resolve(token, name("open")), None);
    }

    #[tokio::test]
    async fn test_balances_converge() {
        let (_dir, db, indexer) = setup().await;

        let issue = token_action("issue", json!({ "to": "alice", "quantity": "100.0000 TOK", "memo": "" }));
        indexer.index(&issue, &ctx(0)).await.unwrap();
        let transfer = token_action(
            "transfer",
            json!({ "from": "alice", "to": "bob", "quantity": "30.0000 TOK", "memo": "rent" }),
        );
        let outcome = indexer.index(&transfer, &ctx(1)).await.unwrap();
        assert!(matches!(outcome, ActionOutcome::Applied { kind: Some(ActionKind::Transfer), .. }));

        assert_eq!(balance(&db, "alice").await, Some(700_000));
        assert_eq!(balance(&db, "bob").await, Some(300_000));
        assert_eq!(count(&db, "actions").await, 2);
        assert_eq!(count(&db, "actions_accounts").await, 2);
    }

    #[tokio::test]
    async fn test_small_credits_sum_exactly() {
        let (_dir, db, indexer) = setup().await;
        for seq in 0..10 {
            let issue = token_action("issue", json!({ "to": "carol", "quantity": "0.0001 TOK", "memo": "" }));
            indexer.index(&issue, &ctx(seq)).await.unwrap();
        }
        assert_eq!(balance(&db, "carol").await, Some(10));
    }

    #[tokio::test]
    async fn test_debit_without_balance_is_noop() {
        let (_dir, db, indexer) = setup().await;
        let transfer = token_action(
            "transfer",
            json!({ "from": "nobody", "to": "bob", "quantity": "1.0000 TOK", "memo": "" }),
        );
        indexer.index(&transfer, &ctx(0)).await.unwrap();
        assert_eq!(balance(&db, "nobody").await, None);
        assert_eq!(balance(&db, "bob").await, Some(10_000));
    }

    #[tokio::test]
    async fn test_account_without_abi_is_skipped() {
        let (_dir, db, indexer) = setup().await;
        let mut issue = token_action("issue", json!({ "to": "alice", "quantity": "5.0000 TOK", "memo": "" }));
        issue.account = name("fake.token");

        let outcome = indexer.index(&issue, &ctx(0)).await.unwrap();
        assert!(matches!(outcome, ActionOutcome::NoAbi));
        assert_eq!(count(&db, "actions").await, 0);
        assert_eq!(count(&db, "tokens").await, 0);
    }

    #[tokio::test]
    async fn test_known_account_without_abi_is_skipped() {
        let (_dir, db, indexer) = setup().await;
        {
            let mut conn = db.acquire().await;
            db.tables().accounts.add(&mut conn, name("fake.token"), TIMESTAMP).await.unwrap();
        }
        let mut fake = token_action("issue", json!({ "to": "alice", "quantity": "5.0000 TOK", "memo": "" }));
        fake.account = name("fake.token");

        let outcome = indexer.index(&fake, &ctx(0)).await.unwrap();
        assert!(matches!(outcome, ActionOutcome::NoAbi));
        assert_eq!(count(&db, "actions").await, 0);

        let issue = token_action("issue", json!({ "to": "alice", "quantity": "5.0000 TOK", "memo": "" }));
        let outcome = indexer.index(&issue, &ctx(1)).await.unwrap();
        assert!(matches!(outcome, ActionOutcome::Applied { kind: Some(ActionKind::Issue), .. }));
        assert_eq!(count(&db, "actions").await, 1);
        assert_eq!(balance(&db, "alice").await, Some(50_000));
    }

    #[tokio::test]
    async fn test_mixed_precision_is_not_summed() {
        let (_dir, db, indexer) = setup().await;
        let issue = token_action("issue", json!({ "to": "alice", "quantity": "1.0000 TOK", "memo": "" }));
        indexer.index(&issue, &ctx(0)).await.unwrap();

        let coarse = token_action("issue", json!({ "to": "alice", "quantity": "1.00 TOK", "memo": "" }));
        let outcome = indexer.index(&coarse, &ctx(1)).await.unwrap();
        assert!(matches!(outcome, ActionOutcome::ProjectionFailed { kind: ActionKind::Issue, .. }));

        let transfer = token_action(
            "transfer",
            json!({ "from": "alice", "to": "bob", "quantity": "0.50 TOK", "memo": "" }),
        );
        let outcome = indexer.index(&transfer, &ctx(2)).await.unwrap();
        assert!(matches!(outcome, ActionOutcome::ProjectionFailed { kind: ActionKind::Transfer, .. }));

        assert_eq!(count(&db, "actions").await, 3);
        assert_eq!(balance(&db, "alice").await, Some(10_000));
        assert_eq!(balance(&db, "bob").await, None);
    }

    #[tokio::test]
    async fn test_payload_mismatch_is_a_decode_error() {
        let (_dir, db, indexer) = setup().await;
        let mut issue = token_action("issue", json!({ "to": "alice", "quantity": "5.0000 TOK", "memo": "" }));
        issue.data.truncate(10);
        let err = indexer.index(&issue, &ctx(0)).await.unwrap_err();
        assert!(err.is_decode());

        issue.name = name("burn");
        let err = indexer.index(&issue, &ctx(0)).await.unwrap_err();
        assert!(err.is_decode());
        assert_eq!(count(&db, "actions").await, 0);
    }

    #[tokio::test]
    async fn test_unrecognized_action_is_stored_only() {
        let (_dir, db, indexer) = setup().await;
        let open = token_action("open", json!({ "owner": "alice" }));
        let outcome = indexer.index(&open, &ctx(0)).await.unwrap();
        assert!(matches!(outcome, ActionOutcome::Applied { kind: None, .. }));
        assert_eq!(count(&db, "actions").await, 1);
        assert_eq!(count(&db, "tokens").await, 0);
    }

    #[tokio::test]
    async fn test_stake_and_vote_are_replaced() {
        let (_dir, db, indexer) = setup().await;
        for (seq, cpu) in [(0, "10.0000 SYS"), (1, "4.0000 SYS")] {
            let delegate = system_action(
                "delegatebw",
                json!({
                    "from": "eosio",
                    "receiver": "alice",
                    "stake_net_quantity": "1.0000 SYS",
                    "stake_cpu_quantity": cpu,
                    "transfer": false
                }),
            );
            indexer.index(&delegate, &ctx(seq)).await.unwrap();
        }
        for (seq, producers) in [(2, json!(["prod.a", "prod.b"])), (3, json!(["prod.c"]))] {
            let vote = system_action("voteproducer", json!({ "voter": "alice", "proxy": "", "producers": producers }));
            indexer.index(&vote, &ctx(seq)).await.unwrap();
        }

        let mut conn = db.acquire().await;
        let tables = db.tables();
        assert_eq!(tables.stakes.get(&mut conn, name("alice")).await.unwrap(), Some((40_000, 10_000)));
        assert_eq!(tables.votes.producers(&mut conn, name("alice")).await.unwrap(), Some(vec![name("prod.c")]));
    }

    #[tokio::test]
    async fn test_setabi_replaces_cached_abi() {
        let (_dir, db, indexer) = setup().await;
        let issue = token_action("issue", json!({ "to": "alice", "quantity": "1.0000 TOK", "memo": "" }));
        indexer.index(&issue, &ctx(0)).await.unwrap();

        // New ABI without the issue action.
        let mut abi = token_abi();
        abi.actions.retain(|a| a.name != name("issue"));
        let setabi = system_action(
            "setabi",
            json!({ "account": "eosio.token", "abi": hex::encode(abi.pack().unwrap()) }),
        );
        let outcome = indexer.index(&setabi, &ctx(1)).await.unwrap();
        assert!(matches!(outcome, ActionOutcome::Applied { kind: Some(ActionKind::SetAbi), .. }));

        let err = indexer.index(&issue, &ctx(2)).await.unwrap_err();
        assert!(err.is_decode());
        assert_eq!(balance(&db, "alice").await, Some(10_000));
    }

    #[tokio::test]
    async fn test_bad_abi_bytes_keep_action_row() {
        let (_dir, db, indexer) = setup().await;
        let setabi = system_action("setabi", json!({ "account": "eosio.token", "abi": "0102" }));
        let outcome = indexer.index(&setabi, &ctx(0)).await.unwrap();
        assert!(matches!(outcome, ActionOutcome::ProjectionFailed { kind: ActionKind::SetAbi, .. }));
        assert_eq!(count(&db, "actions").await, 1);

        let mut conn = db.acquire().await;
        assert!(db.tables().accounts.abi(&mut conn, name("eosio.token")).await.unwrap().is_some());
    }
}
