// 📅 Subscription Book - activation / expiry bookkeeping
//
// A purchase becomes an ActivatedSubscription with an explicit activation and
// expiry time. Nothing is ever flipped to "expired" in storage: status is a
// pure function of (record, now).
//
//   active  ⇔  now < expires_at

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{slugify, Period, Subscription};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    #[error("subscription not found: {0}")]
    NotFound(String),
    #[error("new expiry {new_expiry} is not after activation {activated_at}")]
    InvalidExpiry {
        activated_at: DateTime<Utc>,
        new_expiry: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
        }
    }
}

/// A purchase recorded locally after a successful payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivatedSubscription {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub sol_price: f64,
    pub period: Period,
    pub category: String,
    pub activated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cashback_earned: Option<f64>,
    /// Payment signature standing in for the NFT mint reference
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nft_mint: Option<String>,
}

impl ActivatedSubscription {
    /// Activate `subscription` at `now` for one billing period
    pub fn activate(
        subscription: &Subscription,
        now: DateTime<Utc>,
        cashback_earned: Option<f64>,
        signature: Option<String>,
    ) -> Self {
        ActivatedSubscription {
            id: format!("{}-{}", slugify(&subscription.name), now.timestamp_millis()),
            name: subscription.name.clone(),
            price: subscription.price,
            sol_price: subscription.sol_price,
            period: subscription.period,
            category: subscription.category.clone(),
            activated_at: now,
            expires_at: now + subscription.period.duration(),
            cashback_earned,
            nft_mint: signature,
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn status(&self, now: DateTime<Utc>) -> SubscriptionStatus {
        if self.is_active(now) {
            SubscriptionStatus::Active
        } else {
            SubscriptionStatus::Expired
        }
    }

    /// Whole days left, rounded up. Zero or negative once expired.
    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        let remaining_ms = (self.expires_at - now).num_milliseconds();
        let day_ms = Duration::days(1).num_milliseconds();
        if remaining_ms > 0 {
            (remaining_ms + day_ms - 1) / day_ms
        } else {
            remaining_ms / day_ms
        }
    }

    /// Move the expiry (renewal)
    pub fn extend(&mut self, new_expiry: DateTime<Utc>) -> Result<(), SubscriptionError> {
        if new_expiry <= self.activated_at {
            return Err(SubscriptionError::InvalidExpiry {
                activated_at: self.activated_at,
                new_expiry,
            });
        }
        self.expires_at = new_expiry;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStats {
    pub active_subscriptions: usize,
    /// Sum of prices of active subscriptions
    pub total_value: f64,
}

/// Row of the account screen's order history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderHistoryItem {
    pub id: String,
    pub subscription_name: String,
    pub price: f64,
    pub sol_price: f64,
    pub status: String,
    pub date: DateTime<Utc>,
    pub cashback_earned: f64,
}

// ============================================================================
// BOOK
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct SubscriptionBook {
    records: Vec<ActivatedSubscription>,
}

impl SubscriptionBook {
    pub fn new() -> Self {
        SubscriptionBook {
            records: Vec::new(),
        }
    }

    pub fn from_records(records: Vec<ActivatedSubscription>) -> Self {
        SubscriptionBook { records }
    }

    pub fn record(&mut self, subscription: ActivatedSubscription) {
        log::info!(
            "Activated {} until {}",
            subscription.name,
            subscription.expires_at.format("%Y-%m-%d")
        );
        self.records.push(subscription);
    }

    /// All records in activation (insertion) order
    pub fn all(&self) -> &[ActivatedSubscription] {
        &self.records
    }

    pub fn find(&self, id: &str) -> Option<&ActivatedSubscription> {
        self.records.iter().find(|s| s.id == id)
    }

    pub fn active(&self, now: DateTime<Utc>) -> Vec<&ActivatedSubscription> {
        self.records.iter().filter(|s| s.is_active(now)).collect()
    }

    pub fn expired(&self, now: DateTime<Utc>) -> Vec<&ActivatedSubscription> {
        self.records
            .iter()
            .filter(|s| s.status(now) == SubscriptionStatus::Expired)
            .collect()
    }

    /// Active subscriptions ending within `days`. A horizon past the end of
    /// the calendar covers every active subscription; a negative one none.
    pub fn expiring_within(&self, now: DateTime<Utc>, days: i64) -> Vec<&ActivatedSubscription> {
        let horizon = Duration::try_days(days).and_then(|d| now.checked_add_signed(d));
        self.records
            .iter()
            .filter(|s| s.is_active(now))
            .filter(|s| match horizon {
                Some(horizon) => s.expires_at <= horizon,
                None => days > 0,
            })
            .collect()
    }

    pub fn extend(&mut self, id: &str, new_expiry: DateTime<Utc>) -> Result<(), SubscriptionError> {
        let record = self
            .records
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| SubscriptionError::NotFound(id.to_string()))?;
        record.extend(new_expiry)?;
        log::info!("Extended {} until {}", id, new_expiry.format("%Y-%m-%d"));
        Ok(())
    }

    pub fn stats(&self, now: DateTime<Utc>) -> SubscriptionStats {
        let active = self.active(now);
        SubscriptionStats {
            active_subscriptions: active.len(),
            total_value: active.iter().map(|s| s.price).sum(),
        }
    }

    /// Every purchase as an order, newest first
    pub fn order_history(&self) -> Vec<OrderHistoryItem> {
        let mut history: Vec<OrderHistoryItem> = self
            .records
            .iter()
            .map(|s| OrderHistoryItem {
                id: s.id.clone(),
                subscription_name: s.name.clone(),
                price: s.price,
                sol_price: s.sol_price,
                status: "completed".to_string(),
                date: s.activated_at,
                cashback_earned: s.cashback_earned.unwrap_or(0.0),
            })
            .collect();

        history.sort_by(|a, b| b.date.cmp(&a.date));
        history
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
