// 💰 Cashback Ledger
//
// Every purchase earns a fixed share of its price back as BONK. The ledger is
// an append-only log of earn/redeem entries; balances are never stored, they
// are derived by scanning the log.
//
// available = max(0, Σ completed earned − Σ completed redeemed)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default cashback share of the subscription price (10%)
pub const DEFAULT_CASHBACK_RATE: f64 = 0.10;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CashbackError {
    #[error("insufficient balance: available {available:.2}, requested {requested:.2}")]
    InsufficientBalance { available: f64, requested: f64 },
    #[error("invalid amount: {0}")]
    InvalidAmount(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Earned,
    Redeemed,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Earned => "earned",
            TransactionType::Redeemed => "redeemed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }
}

/// One ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashbackTransaction {
    pub id: String,
    pub subscription_name: String,
    /// Purchase price the cashback was computed from (0 for redemptions)
    pub subscription_price: f64,
    pub cashback_amount: f64,
    pub transaction_type: TransactionType,
    pub timestamp: DateTime<Utc>,
    pub status: TransactionStatus,
}

impl CashbackTransaction {
    fn new(
        prefix: &str,
        subscription_name: &str,
        subscription_price: f64,
        cashback_amount: f64,
        transaction_type: TransactionType,
        timestamp: DateTime<Utc>,
    ) -> Self {
        CashbackTransaction {
            id: entry_id(prefix, timestamp),
            subscription_name: subscription_name.to_string(),
            subscription_price,
            cashback_amount,
            transaction_type,
            timestamp,
            status: TransactionStatus::Completed,
        }
    }

    pub fn is_earned(&self) -> bool {
        self.transaction_type == TransactionType::Earned
    }
}

/// "<prefix>-<millis>-<9 random chars>"
fn entry_id(prefix: &str, timestamp: DateTime<Utc>) -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", prefix, timestamp.timestamp_millis(), &random[..9])
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashbackBalance {
    pub total_earned: f64,
    pub total_redeemed: f64,
    pub available_balance: f64,
    pub pending_balance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashbackStats {
    pub total_transactions: usize,
    pub total_earned: f64,
    pub total_redeemed: f64,
    pub available_balance: f64,
    pub average_cashback: f64,
}

// ============================================================================
// LEDGER
// ============================================================================

#[derive(Debug, Clone)]
pub struct CashbackLedger {
    /// Append-only log, in insertion order
    transactions: Vec<CashbackTransaction>,
    rate: f64,
}

impl CashbackLedger {
    pub fn new() -> Self {
        Self::with_rate(DEFAULT_CASHBACK_RATE)
    }

    pub fn with_rate(rate: f64) -> Self {
        CashbackLedger {
            transactions: Vec::new(),
            rate,
        }
    }

    /// Rebuild a ledger from persisted entries
    pub fn from_transactions(transactions: Vec<CashbackTransaction>, rate: f64) -> Self {
        CashbackLedger { transactions, rate }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Raw log in insertion order (what gets persisted)
    pub fn entries(&self) -> &[CashbackTransaction] {
        &self.transactions
    }

    /// Cashback for a purchase at `subscription_price`
    pub fn calculate_cashback(&self, subscription_price: f64) -> f64 {
        subscription_price * self.rate
    }

    pub fn earn_cashback(
        &mut self,
        subscription_name: &str,
        subscription_price: f64,
    ) -> CashbackTransaction {
        self.earn_cashback_at(subscription_name, subscription_price, Utc::now())
    }

    pub fn earn_cashback_at(
        &mut self,
        subscription_name: &str,
        subscription_price: f64,
        timestamp: DateTime<Utc>,
    ) -> CashbackTransaction {
        let cashback_amount = self.calculate_cashback(subscription_price);
        let transaction = CashbackTransaction::new(
            "cashback",
            subscription_name,
            subscription_price,
            cashback_amount,
            TransactionType::Earned,
            timestamp,
        );

        self.transactions.push(transaction.clone());
        log::info!(
            "Earned {:.2} BONK cashback for {}",
            cashback_amount,
            subscription_name
        );

        transaction
    }

    pub fn redeem_cashback(
        &mut self,
        amount: f64,
        subscription_name: &str,
    ) -> Result<CashbackTransaction, CashbackError> {
        self.redeem_cashback_at(amount, subscription_name, Utc::now())
    }

    pub fn redeem_cashback_at(
        &mut self,
        amount: f64,
        subscription_name: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<CashbackTransaction, CashbackError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(CashbackError::InvalidAmount(amount));
        }

        let available = self.available_balance();
        log::debug!(
            "Attempting to redeem {:.2} BONK, available {:.2}",
            amount,
            available
        );

        if available < amount {
            log::warn!(
                "Insufficient balance. Available: {:.2}, Requested: {:.2}",
                available,
                amount
            );
            return Err(CashbackError::InsufficientBalance {
                available,
                requested: amount,
            });
        }

        let transaction = CashbackTransaction::new(
            "redemption",
            subscription_name,
            0.0,
            amount,
            TransactionType::Redeemed,
            timestamp,
        );

        self.transactions.push(transaction.clone());
        log::info!(
            "Redeemed {:.2} BONK cashback for {} (remaining {:.2})",
            amount,
            subscription_name,
            self.available_balance()
        );

        Ok(transaction)
    }

    /// Append an entry as-is (imports, pending/failed entries)
    pub fn record(&mut self, transaction: CashbackTransaction) {
        self.transactions.push(transaction);
    }

    /// All entries, newest first
    pub fn transactions(&self) -> Vec<CashbackTransaction> {
        let mut sorted = self.transactions.clone();
        sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        sorted
    }

    /// Entries of one type, in log order
    pub fn transactions_by_type(&self, transaction_type: TransactionType) -> Vec<&CashbackTransaction> {
        self.transactions
            .iter()
            .filter(|t| t.transaction_type == transaction_type)
            .collect()
    }

    fn sum(&self, transaction_type: TransactionType, status: TransactionStatus) -> f64 {
        self.transactions
            .iter()
            .filter(|t| t.transaction_type == transaction_type && t.status == status)
            .map(|t| t.cashback_amount)
            .sum()
    }

    pub fn balance(&self) -> CashbackBalance {
        let total_earned = self.sum(TransactionType::Earned, TransactionStatus::Completed);
        let total_redeemed = self.sum(TransactionType::Redeemed, TransactionStatus::Completed);
        let pending_balance = self.sum(TransactionType::Earned, TransactionStatus::Pending);

        CashbackBalance {
            total_earned,
            total_redeemed,
            available_balance: (total_earned - total_redeemed).max(0.0),
            pending_balance,
        }
    }

    pub fn available_balance(&self) -> f64 {
        self.balance().available_balance
    }

    pub fn can_redeem(&self, amount: f64) -> bool {
        self.available_balance() >= amount
    }

    pub fn stats(&self) -> CashbackStats {
        let balance = self.balance();
        let earned_count = self
            .transactions
            .iter()
            .filter(|t| t.is_earned() && t.status == TransactionStatus::Completed)
            .count();

        CashbackStats {
            total_transactions: self.transactions.len(),
            total_earned: balance.total_earned,
            total_redeemed: balance.total_redeemed,
            available_balance: balance.available_balance,
            average_cashback: if earned_count > 0 {
                balance.total_earned / earned_count as f64
            } else {
                0.0
            },
        }
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn clear(&mut self) {
        self.transactions.clear();
    }

    /// Sample purchases for demos
    pub fn seed_demo_data(&mut self) {
        self.earn_cashback("Netflix Premium", 599.40);
        self.earn_cashback("Spotify Family", 299.40);
        self.earn_cashback("YouTube Premium", 399.40);
        log::info!("Added demo cashback data: {:?}", self.balance());
    }
}

impl Default for CashbackLedger {
    fn default() -> Self {
        Self::new()
    }
}
