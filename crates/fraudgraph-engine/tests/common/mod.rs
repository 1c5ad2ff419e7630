#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};

use fraudgraph_core::{RawTable, Transaction, REQUIRED_COLUMNS};

/// Route stage logs through `RUST_LOG` when a test run wants them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Fixed origin all test timestamps are relative to.
pub fn origin() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Transaction `hours` past the origin.
pub fn tx(sender: &str, receiver: &str, amount: f64, hours: i64) -> Transaction {
    tx_min(sender, receiver, amount, hours, 0)
}

/// Transaction `hours` and `minutes` past the origin.
pub fn tx_min(sender: &str, receiver: &str, amount: f64, hours: i64, minutes: i64) -> Transaction {
    Transaction {
        id: format!("{sender}-{receiver}-{hours}-{minutes}"),
        sender: sender.to_string(),
        receiver: receiver.to_string(),
        amount,
        timestamp: origin() + Duration::hours(hours) + Duration::minutes(minutes),
    }
}

/// Render transactions as the raw tabular input the engine ingests.
pub fn table_of(transactions: &[Transaction]) -> RawTable {
    RawTable::new(
        REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
        transactions
            .iter()
            .map(|t| {
                vec![
                    t.id.clone(),
                    t.sender.clone(),
                    t.receiver.clone(),
                    format!("{}", t.amount),
                    t.timestamp.to_rfc3339(),
                ]
            })
            .collect(),
    )
}
