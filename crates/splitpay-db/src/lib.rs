//! # splitpay-db: Database Layer for SplitPay
//!
//! This crate provides database access for SplitPay.
//! It uses SQLite with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SplitPay Data Flow                               │
//! │                                                                         │
//! │  HTTP handler ──► SplitService                                         │
//! │                        │                                                │
//! │                        ▼                                                │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   splitpay-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │  │   │
//! │  │   │               │    │ UserRepo       │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ SplitRepo      │    │ 001_init.sql │  │   │
//! │  │   │ WAL, FKs      │    │  └ SplitTx     │    │              │  │   │
//! │  │   │               │    │ SmsLogRepo     │    │              │  │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │                     ./splitpay.db                               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (user, split, sms log)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use splitpay_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("splitpay.db")).await?;
//!
//! let split = db.splits().find_by_id_or_code("k3x9q2m7ab").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::sms_log::SmsLogRepository;
pub use repository::split::{NewParticipant, NewSplit, SplitRepository, SplitTx};
pub use repository::user::{NewUser, UserRepository};
