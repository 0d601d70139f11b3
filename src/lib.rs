// Sleek - Core Library
// Exposes all modules for use in CLI, TUI, API server, and tests

pub mod address;        // Wallet address decoding (base64 → base58)
pub mod app;            // Shared application state
pub mod cashback;       // Cashback ledger
pub mod catalog;        // Subscription storefront
pub mod config;
pub mod payment;        // Payment flow + program client boundary
pub mod store;          // SQLite-backed list store + audit trail
pub mod subscriptions;  // Activation / expiry bookkeeping
pub mod wallet;         // Wallet connection boundary

// Re-export commonly used types
pub use address::{base58_decode, base58_encode, base64_to_base58, AddressError, WalletAddress};
pub use app::{AppError, SleekApp};
pub use cashback::{
    CashbackBalance, CashbackError, CashbackLedger, CashbackStats, CashbackTransaction,
    TransactionStatus, TransactionType, DEFAULT_CASHBACK_RATE,
};
pub use catalog::{Catalog, Category, Period, Subscription};
pub use config::{Config, ConfigError};
pub use payment::{
    Instruction, LocalProgram, PaymentError, PaymentReceipt, PaymentService, ProgramError,
    SubscriptionNftData, SubscriptionProgram,
};
pub use store::{export_order_history_csv, Event, Store, StoreError};
pub use subscriptions::{
    ActivatedSubscription, OrderHistoryItem, SubscriptionBook, SubscriptionError,
    SubscriptionStats, SubscriptionStatus,
};
pub use wallet::{
    AppIdentity, BalanceSource, MockWallet, WalletAdapter, WalletConnection, WalletError,
    WalletService,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
