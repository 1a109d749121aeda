//! # Repository Module
//!
//! Database repository implementations for SplitPay.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  SplitService                                                          │
//! │       │                                                                 │
//! │       │  db.splits().find_by_id_or_code("k3x9q2m7ab")                  │
//! │       ▼                                                                 │
//! │  SplitRepository                                                       │
//! │  ├── create(split, participants)     one transaction                   │
//! │  ├── find_by_id_or_code(key)                                           │
//! │  ├── participants(split_id)                                            │
//! │  └── lock(split_id) ──► SplitTx      per-split unit of work            │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Settlement rules stay in splitpay-core; repositories only move rows.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`UserRepository`](user::UserRepository) - Lazily created creators
//! - [`SplitRepository`](split::SplitRepository) - Splits and participants
//! - [`SmsLogRepository`](sms_log::SmsLogRepository) - Invite audit trail

pub mod sms_log;
pub mod split;
pub mod user;

use chrono::{DateTime, Utc};

/// Current time truncated to whole microseconds.
///
/// SQLite stores timestamps as text; truncating keeps a value read back equal
/// to the value written.
pub(crate) fn now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now)
}
