use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cashback::{CashbackLedger, CashbackTransaction};
use crate::subscriptions::{ActivatedSubscription, OrderHistoryItem, SubscriptionBook};

/// Storage key of the activated subscription list
pub const KEY_SUBSCRIPTIONS: &str = "activatedSubscriptions";
/// Storage key of the cashback log
pub const KEY_CASHBACK: &str = "cashbackTransactions";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("corrupt value under key '{key}': {source}")]
    Corrupt {
        key: String,
        source: serde_json::Error,
    },
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("invalid timestamp in event log: {0}")]
    Timestamp(#[from] chrono::ParseError),
    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),
}

/// Event for audit trail
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

/// Persisted key-value store holding JSON lists, backed by SQLite
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        // Enable WAL mode for crash recovery
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let store = Store { conn };
        store.setup()?;
        log::debug!("Opened store at {}", path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Store {
            conn: Connection::open_in_memory()?,
        };
        store.setup()?;
        Ok(store)
    }

    fn setup(&self) -> Result<(), StoreError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        // ==========================================================================
        // Events Table (audit trail)
        // ==========================================================================
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id TEXT UNIQUE NOT NULL,
                timestamp TEXT NOT NULL,
                event_type TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                data TEXT NOT NULL,
                actor TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
            [],
        )?;

        Ok(())
    }

    // ========================================================================
    // RAW KEY/VALUE
    // ========================================================================

    pub fn get_raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    pub fn set_raw(&self, key: &str, value: &str) -> Result<(), StoreError> {
        write_raw(&self.conn, key, value)
    }

    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", [key])?;
        Ok(())
    }

    /// Load a JSON list. A missing key is an empty list.
    pub fn load_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, StoreError> {
        match self.get_raw(key)? {
            None => Ok(Vec::new()),
            Some(json) => serde_json::from_str(&json).map_err(|source| StoreError::Corrupt {
                key: key.to_string(),
                source,
            }),
        }
    }

    pub fn save_list<T: Serialize>(&self, key: &str, items: &[T]) -> Result<(), StoreError> {
        let json = serde_json::to_string(items)?;
        self.set_raw(key, &json)
    }

    // ========================================================================
    // DOMAIN LISTS
    // ========================================================================

    pub fn load_ledger(&self, rate: f64) -> Result<CashbackLedger, StoreError> {
        let entries: Vec<CashbackTransaction> = self.load_list(KEY_CASHBACK)?;
        Ok(CashbackLedger::from_transactions(entries, rate))
    }

    pub fn save_ledger(&self, ledger: &CashbackLedger) -> Result<(), StoreError> {
        self.save_list(KEY_CASHBACK, ledger.entries())
    }

    pub fn load_book(&self) -> Result<SubscriptionBook, StoreError> {
        let records: Vec<ActivatedSubscription> = self.load_list(KEY_SUBSCRIPTIONS)?;
        Ok(SubscriptionBook::from_records(records))
    }

    pub fn save_book(&self, book: &SubscriptionBook) -> Result<(), StoreError> {
        self.save_list(KEY_SUBSCRIPTIONS, book.all())
    }

    // ========================================================================
    // AUDIT TRAIL
    // ========================================================================

    /// Insert event into audit trail
    pub fn insert_event(&self, event: &Event) -> Result<(), StoreError> {
        write_event(&self.conn, event)
    }

    // ========================================================================
    // ATOMIC WRITES
    // ========================================================================

    /// Write the changed lists and the event describing the change in one
    /// transaction. Either everything lands or nothing does.
    pub fn commit(
        &mut self,
        book: Option<&SubscriptionBook>,
        ledger: Option<&CashbackLedger>,
        event: &Event,
    ) -> Result<(), StoreError> {
        let book_json = book.map(|b| serde_json::to_string(b.all())).transpose()?;
        let ledger_json = ledger.map(|l| serde_json::to_string(l.entries())).transpose()?;

        let tx = self.conn.transaction()?;
        if let Some(json) = &book_json {
            write_raw(&tx, KEY_SUBSCRIPTIONS, json)?;
        }
        if let Some(json) = &ledger_json {
            write_raw(&tx, KEY_CASHBACK, json)?;
        }
        write_event(&tx, event)?;
        tx.commit()?;

        log::debug!("Committed {} ({})", event.event_type, event.entity_id);
        Ok(())
    }

    /// Get events for a specific entity, newest first
    pub fn events_for_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<Event>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
             FROM events
             WHERE entity_type = ?1 AND entity_id = ?2
             ORDER BY timestamp DESC, id DESC",
        )?;

        let rows = stmt
            .query_map(params![entity_type, entity_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut events = Vec::with_capacity(rows.len());
        for (event_id, timestamp, event_type, entity_type, entity_id, data, actor) in rows {
            events.push(Event {
                event_id,
                timestamp: DateTime::parse_from_rfc3339(&timestamp)?.with_timezone(&Utc),
                event_type,
                entity_type,
                entity_id,
                data: serde_json::from_str(&data)?,
                actor,
            });
        }

        Ok(events)
    }

    pub fn event_count(&self) -> Result<i64, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn write_raw(conn: &Connection, key: &str, value: &str) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, value, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

fn write_event(conn: &Connection, event: &Event) -> Result<(), StoreError> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Write order history as CSV (one row per purchase)
pub fn export_order_history_csv(path: &Path, items: &[OrderHistoryItem]) -> Result<usize, StoreError> {
    let mut writer = csv::Writer::from_path(path)?;
    for item in items {
        writer.serialize(item)?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(items.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Period, Subscription};

    #[test]
    fn test_missing_key_is_empty_list() {
        let store = Store::open_in_memory().unwrap();
        let items: Vec<ActivatedSubscription> = store.load_list(KEY_SUBSCRIPTIONS).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_save_overwrites_list() {
        let store = Store::open_in_memory().unwrap();
        store.save_list("numbers", &[1, 2, 3]).unwrap();
        store.save_list("numbers", &[4]).unwrap();
        let numbers: Vec<i32> = store.load_list("numbers").unwrap();
        assert_eq!(numbers, vec![4]);

        store.remove("numbers").unwrap();
        assert!(store.get_raw("numbers").unwrap().is_none());
    }

    #[test]
    fn test_corrupt_value_is_error() {
        let store = Store::open_in_memory().unwrap();
        store.set_raw(KEY_CASHBACK, "{not json").unwrap();
        let result = store.load_ledger(0.1);
        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn test_ledger_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        let mut ledger = CashbackLedger::new();
        ledger.earn_cashback("Notion Plus", 96.0);
        ledger.redeem_cashback(1.0, "Manual Redemption").unwrap();
        store.save_ledger(&ledger).unwrap();

        let loaded = store.load_ledger(0.1).unwrap();
        assert_eq!(loaded.entries(), ledger.entries());
        assert_eq!(loaded.balance(), ledger.balance());
    }

    #[test]
    fn test_book_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        let mut book = SubscriptionBook::new();
        let plan = Subscription::new("Walmart+", 98.0, 0.55, Period::Year, "Shopping");
        book.record(ActivatedSubscription::activate(&plan, Utc::now(), Some(9.8), None));
        store.save_book(&book).unwrap();

        let loaded = store.load_book().unwrap();
        assert_eq!(loaded.all(), book.all());
    }

    #[test]
    fn test_events() {
        let store = Store::open_in_memory().unwrap();
        let event = Event::new(
            "subscription_activated",
            "subscription",
            "walmart+-1",
            serde_json::json!({ "price": 98.0 }),
            "payment_service",
        );
        store.insert_event(&event).unwrap();
        store
            .insert_event(&Event::new("other", "subscription", "x", serde_json::json!({}), "t"))
            .unwrap();

        let events = store.events_for_entity("subscription", "walmart+-1").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_id, event.event_id);
        assert_eq!(events[0].data["price"], 98.0);
        assert_eq!(store.event_count().unwrap(), 2);
    }

    #[test]
    fn test_commit_writes_lists_and_event() {
        let mut store = Store::open_in_memory().unwrap();
        let mut book = SubscriptionBook::new();
        let plan = Subscription::new("Walmart+", 98.0, 0.55, Period::Year, "Shopping");
        book.record(ActivatedSubscription::activate(&plan, Utc::now(), Some(9.8), None));
        let mut ledger = CashbackLedger::new();
        ledger.earn_cashback("Walmart+", 98.0);

        let event = Event::new("subscription_activated", "subscription", "w", serde_json::json!({}), "t");
        store.commit(Some(&book), Some(&ledger), &event).unwrap();

        assert_eq!(store.load_book().unwrap().len(), 1);
        assert_eq!(store.load_ledger(0.1).unwrap().len(), 1);
        assert_eq!(store.event_count().unwrap(), 1);
    }

    #[test]
    fn test_commit_rolls_back_on_failed_write() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .conn
            .execute_batch(
                "CREATE TRIGGER reject_cashback BEFORE INSERT ON kv
                 WHEN NEW.key = 'cashbackTransactions'
                 BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
            )
            .unwrap();

        let mut book = SubscriptionBook::new();
        let plan = Subscription::new("Walmart+", 98.0, 0.55, Period::Year, "Shopping");
        book.record(ActivatedSubscription::activate(&plan, Utc::now(), Some(9.8), None));
        let mut ledger = CashbackLedger::new();
        ledger.earn_cashback("Walmart+", 98.0);

        let event = Event::new("subscription_activated", "subscription", "w", serde_json::json!({}), "t");
        let result = store.commit(Some(&book), Some(&ledger), &event);

        assert!(matches!(result, Err(StoreError::Database(_))));
        assert!(store.load_book().unwrap().is_empty());
        assert!(store.load_ledger(0.1).unwrap().is_empty());
        assert_eq!(store.event_count().unwrap(), 0);
    }

    #[test]
    fn test_export_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");

        let mut book = SubscriptionBook::new();
        let plan = Subscription::new("Walmart+", 98.0, 0.55, Period::Year, "Shopping");
        book.record(ActivatedSubscription::activate(&plan, Utc::now(), Some(9.8), None));

        let written = export_order_history_csv(&path, &book.order_history()).unwrap();
        assert_eq!(written, 1);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("id,subscriptionName,price,solPrice,status,date,cashbackEarned"));
        assert!(contents.contains("Walmart+"));
    }
}
