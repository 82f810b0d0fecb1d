pub mod abi;
pub mod models;
pub mod normalizer;
pub mod reader;
pub mod rpc;
pub mod traits;

pub use models::LedgerRecord;
pub use reader::LedgerReader;
pub use rpc::{DecodeMode, JsonRpcLedger};
pub use traits::LedgerSource;
