pub mod command;
pub mod transaction;
pub mod wallet;

pub use command::{Command, CommandType};
pub use transaction::{Transaction, Transfer, WalletNotification, NATIVE_LOG_INDEX};
pub use wallet::{strip_hex_prefix, TransactionHash, UserId, WalletAddress, ZERO_ADDRESS};
