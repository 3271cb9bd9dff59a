pub mod command_handler;
mod listener;
pub mod wallet_tracker;

pub use command_handler::CommandDispatcher;
pub use wallet_tracker::WalletTracker;
