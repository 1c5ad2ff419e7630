//! Transaction records and the tabular ingest boundary.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, CoreResult};

/// Opaque account identifier. Ordering is lexicographic wherever the
/// pipeline needs a deterministic order.
pub type AccountId = String;

/// Column names every input table must carry.
pub const REQUIRED_COLUMNS: [&str; 5] = [
    "transaction_id",
    "sender_id",
    "receiver_id",
    "amount",
    "timestamp",
];

/// A single money movement between two accounts.
///
/// Immutable after ingest; the graph and every detector borrow these records
/// by index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Caller-supplied transaction identifier.
    pub id: String,
    /// Sending account.
    pub sender: AccountId,
    /// Receiving account.
    pub receiver: AccountId,
    /// Transferred amount.
    pub amount: f64,
    /// Instant the transaction occurred.
    pub timestamp: DateTime<Utc>,
}

/// An untyped tabular batch of transactions, as handed over by whatever
/// transport the caller uses. Delimiters and encodings are the caller's
/// concern; the engine only sees headers and string cells.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTable {
    /// Column names, in file order.
    pub headers: Vec<String>,
    /// One entry per row, each aligned with `headers`.
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Create a table from headers and rows.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// The coerced, timestamp-ordered transaction batch an analysis runs over.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// Transactions sorted by timestamp ascending (stable).
    pub transactions: Vec<Transaction>,
    /// Rows discarded because amount or timestamp failed coercion.
    pub dropped_rows: usize,
}

impl Dataset {
    /// Ingest a raw table: verify the schema, coerce amounts and timestamps,
    /// drop rows that fail coercion, and sort by timestamp (stable).
    pub fn from_table(table: &RawTable) -> CoreResult<Self> {
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|c| table.column_index(c).is_none())
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(CoreError::schema(missing));
        }

        let id_col = table.column_index("transaction_id").unwrap();
        let sender_col = table.column_index("sender_id").unwrap();
        let receiver_col = table.column_index("receiver_id").unwrap();
        let amount_col = table.column_index("amount").unwrap();
        let ts_col = table.column_index("timestamp").unwrap();
        let width = [id_col, sender_col, receiver_col, amount_col, ts_col]
            .into_iter()
            .max()
            .unwrap();

        let mut transactions = Vec::with_capacity(table.rows.len());
        let mut dropped = 0usize;
        for row in &table.rows {
            if row.len() <= width {
                dropped += 1;
                continue;
            }
            let amount = parse_amount(&row[amount_col]);
            let timestamp = parse_timestamp(&row[ts_col]);
            match (amount, timestamp) {
                (Some(amount), Some(timestamp)) => transactions.push(Transaction {
                    id: row[id_col].clone(),
                    sender: row[sender_col].clone(),
                    receiver: row[receiver_col].clone(),
                    amount,
                    timestamp,
                }),
                _ => dropped += 1,
            }
        }
        if dropped > 0 {
            debug!(dropped, "dropped rows with unparseable amount or timestamp");
        }

        transactions.sort_by_key(|t| t.timestamp);
        Ok(Self {
            transactions,
            dropped_rows: dropped,
        })
    }

    /// Build a dataset from already-typed transactions. Nothing is dropped;
    /// the batch is sorted by timestamp (stable).
    pub fn from_transactions(mut transactions: Vec<Transaction>) -> Self {
        transactions.sort_by_key(|t| t.timestamp);
        Self {
            transactions,
            dropped_rows: 0,
        }
    }

    /// Number of transactions in the batch.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

fn parse_amount(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().parse().ok()?;
    value.is_finite().then_some(value)
}

/// Parse an absolute instant. Accepts RFC 3339 plus the common naive
/// date/datetime shapes, read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    None
}
