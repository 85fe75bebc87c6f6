//! Client side of the cellar transaction service: the typed JSON-RPC client and the types
//! needed to draft and sign sponsored transactions.

pub mod rpc;

pub use cellar_ledger::signing::{sign, UserSignature};
pub use cellar_ledger::transaction::{Operation, PureValue, TransactionBuilder};
pub use cellar_ledger::types::{Address, Digest, ObjectId};
pub use cellar_ledger::Network;
