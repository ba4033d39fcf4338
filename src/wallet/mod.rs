pub mod sub_wallets;
pub mod sync;
pub mod types;

pub use sub_wallets::{SubWalletLedger, WalletKeys};
pub use sync::WalletSynchronizer;
pub use types::*;
