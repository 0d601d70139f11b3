// Application state shared by the CLI, the TUI and the HTTP server.
//
// Loads the two persisted lists on open, mutates them in memory, and writes
// the affected list back (plus an audit event) after every successful action.

use chrono::{DateTime, Utc};
use std::path::Path;

use crate::address::WalletAddress;
use crate::cashback::{CashbackBalance, CashbackError, CashbackLedger, CashbackStats, CashbackTransaction};
use crate::catalog::{Catalog, Subscription};
use crate::config::Config;
use crate::payment::{PaymentError, PaymentReceipt, PaymentService, SubscriptionProgram};
use crate::store::{Event, Store, StoreError};
use crate::subscriptions::{
    ActivatedSubscription, OrderHistoryItem, SubscriptionBook, SubscriptionError, SubscriptionStats,
};

/// Audit entity id for actions on the cashback log as a whole
const LEDGER_ENTITY: &str = "ledger";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("unknown subscription: {0}")]
    UnknownSubscription(String),
    #[error(transparent)]
    Payment(#[from] PaymentError),
    #[error(transparent)]
    Cashback(#[from] CashbackError),
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct SleekApp<P: SubscriptionProgram> {
    store: Store,
    catalog: Catalog,
    ledger: CashbackLedger,
    book: SubscriptionBook,
    payments: PaymentService<P>,
}

impl<P: SubscriptionProgram> SleekApp<P> {
    /// Open the store at the configured path
    pub fn open(config: &Config, program: P) -> Result<Self, AppError> {
        let store = Store::open(&config.database_path)?;
        Self::with_store(store, config.cashback_rate, program)
    }

    pub fn open_path(path: &Path, cashback_rate: f64, program: P) -> Result<Self, AppError> {
        Self::with_store(Store::open(path)?, cashback_rate, program)
    }

    pub fn with_store(store: Store, cashback_rate: f64, program: P) -> Result<Self, AppError> {
        let ledger = store.load_ledger(cashback_rate)?;
        let book = store.load_book()?;
        log::debug!(
            "Loaded {} cashback entries and {} subscriptions",
            ledger.len(),
            book.len()
        );

        Ok(SleekApp {
            store,
            catalog: Catalog::with_defaults(),
            ledger,
            book,
            payments: PaymentService::new(program, cashback_rate),
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn ledger(&self) -> &CashbackLedger {
        &self.ledger
    }

    pub fn book(&self) -> &SubscriptionBook {
        &self.book
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn program(&self) -> &P {
        self.payments.program()
    }

    // ========================================================================
    // ACTIONS
    // ========================================================================

    /// Buy a catalog plan by name
    pub fn buy(&mut self, payer: Option<&WalletAddress>, name: &str) -> Result<PaymentReceipt, AppError> {
        let subscription = self
            .catalog
            .find(name)
            .cloned()
            .ok_or_else(|| AppError::UnknownSubscription(name.to_string()))?;
        self.purchase(payer, &subscription)
    }

    /// Buy an arbitrary plan
    pub fn purchase(
        &mut self,
        payer: Option<&WalletAddress>,
        subscription: &Subscription,
    ) -> Result<PaymentReceipt, AppError> {
        let mut ledger = self.ledger.clone();
        let mut book = self.book.clone();
        let receipt = self
            .payments
            .process_payment(payer, subscription, &mut ledger, &mut book)?;

        let event = Event::new(
            "subscription_activated",
            "subscription",
            &receipt.subscription.id,
            serde_json::json!({
                "name": receipt.subscription.name,
                "price": receipt.subscription.price,
                "sol_price": receipt.subscription.sol_price,
                "signature": receipt.transaction_hash,
                "cashback": receipt.cashback,
            }),
            "payment_service",
        );
        self.store.commit(Some(&book), Some(&ledger), &event)?;

        self.ledger = ledger;
        self.book = book;
        Ok(receipt)
    }

    pub fn redeem(&mut self, amount: f64, label: &str) -> Result<CashbackTransaction, AppError> {
        let mut ledger = self.ledger.clone();
        let transaction = ledger.redeem_cashback(amount, label)?;

        let event = Event::new(
            "cashback_redeemed",
            "cashback",
            &transaction.id,
            serde_json::json!({ "amount": amount, "label": label }),
            "cashback_ledger",
        );
        self.store.commit(None, Some(&ledger), &event)?;

        self.ledger = ledger;
        Ok(transaction)
    }

    pub fn extend(&mut self, id: &str, new_expiry: DateTime<Utc>) -> Result<(), AppError> {
        let mut book = self.book.clone();
        book.extend(id, new_expiry)?;

        let event = Event::new(
            "subscription_extended",
            "subscription",
            id,
            serde_json::json!({ "new_expiry": new_expiry.to_rfc3339() }),
            "subscription_book",
        );
        self.store.commit(Some(&book), None, &event)?;

        self.book = book;
        Ok(())
    }

    pub fn seed_demo_data(&mut self) -> Result<(), AppError> {
        let mut ledger = self.ledger.clone();
        ledger.seed_demo_data();

        let event = Event::new(
            "cashback_seeded",
            "cashback",
            LEDGER_ENTITY,
            serde_json::json!({ "entries": ledger.len() - self.ledger.len() }),
            "cashback_ledger",
        );
        self.store.commit(None, Some(&ledger), &event)?;

        self.ledger = ledger;
        Ok(())
    }

    pub fn clear_cashback(&mut self) -> Result<(), AppError> {
        let mut ledger = self.ledger.clone();
        ledger.clear();

        let event = Event::new(
            "cashback_cleared",
            "cashback",
            LEDGER_ENTITY,
            serde_json::json!({ "removed": self.ledger.len() }),
            "cashback_ledger",
        );
        self.store.commit(None, Some(&ledger), &event)?;

        self.ledger = ledger;
        Ok(())
    }

    // ========================================================================
    // VIEWS
    // ========================================================================

    pub fn cashback_balance(&self) -> CashbackBalance {
        self.ledger.balance()
    }

    pub fn cashback_stats(&self) -> CashbackStats {
        self.ledger.stats()
    }

    pub fn cashback_transactions(&self) -> Vec<CashbackTransaction> {
        self.ledger.transactions()
    }

    pub fn active_subscriptions(&self, now: DateTime<Utc>) -> Vec<&ActivatedSubscription> {
        self.book.active(now)
    }

    pub fn subscription_stats(&self, now: DateTime<Utc>) -> SubscriptionStats {
        self.book.stats(now)
    }

    pub fn order_history(&self) -> Vec<OrderHistoryItem> {
        self.book.order_history()
    }
}
