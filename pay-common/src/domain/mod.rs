//! Wire-level domain types shared by the payment core and the node binary.

pub mod audit_log;
pub mod payload;
pub mod transaction;
pub mod user;
pub mod wallet;

pub use audit_log::AuditLog;
pub use payload::{EncryptedPayload, PayloadError, PAYLOAD_LEN};
pub use transaction::{IllegalTransition, Transaction, TransactionStatus, TransactionType};
pub use user::User;
pub use wallet::{Wallet, WalletBalances};
