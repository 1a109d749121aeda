//! # splitpay-core: Pure Business Logic for SplitPay
//!
//! This crate holds the settlement rules of SplitPay as pure functions with
//! zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SplitPay Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Web Client                                   │   │
//! │  │    Create Split ──► Share Link ──► Join ──► Pay (hosted)        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ JSON over HTTP                         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    apps/api (axum)                              │   │
//! │  │    routes ──► SplitService ──► providers (pay / sms / auth)     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ splitpay-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  shares   │  │ validation│  │   │
//! │  │   │  Split    │  │   Money   │  │  total    │  │ sanitize  │  │   │
//! │  │   │Participant│  │Percentage │  │  equal    │  │ amounts   │  │   │
//! │  │   └───────────┘  └───────────┘  │  mixed    │  │ phones    │  │   │
//! │  │                                 └───────────┘  └───────────┘  │   │
//! │  │   ┌─────────────────────────────────────────────────────────┐  │   │
//! │  │   │ lifecycle: status derivation, transition guards, links  │  │   │
//! │  │   └─────────────────────────────────────────────────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 splitpay-db (Database Layer)                    │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Split, Participant, User, SmsLog, statuses)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`shares`] - Total and per-participant share computation
//! - [`lifecycle`] - Split/participant state machine rules
//! - [`validation`] - Sanitizing and validating untrusted input
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use splitpay_core::money::Money;
//! use splitpay_core::shares::{compute_equal_shares, compute_total};
//! use splitpay_core::types::Percentage;
//!
//! // $100.00 bill, 20% tip, no platform fee
//! let total = compute_total(
//!     Money::from_cents(10_000),
//!     Percentage::from_whole(20),
//!     Percentage::zero(),
//! );
//! assert_eq!(total.cents(), 12_000);
//!
//! // Four people, $30.00 each
//! let shares = compute_equal_shares(total, 4).unwrap();
//! assert!(shares.iter().all(|s| s.cents() == 3_000));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod lifecycle;
pub mod money;
pub mod shares;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum participants allowed in a single split.
///
/// ## Business Reason
/// Keeps invite fan-out and re-split transactions bounded.
pub const MAX_PARTICIPANTS: usize = 50;

/// Maximum length of any free-text field after sanitizing.
pub const MAX_TEXT_LENGTH: usize = 500;

/// Maximum length of an opaque identifier (ids and share codes).
pub const MAX_IDENTIFIER_LENGTH: usize = 50;

/// Upper bound for any monetary input, in cents ($1,000,000.00).
pub const MAX_INPUT_AMOUNT_CENTS: i64 = 100_000_000;

/// Upper bound for a single checkout session, in cents ($100,000.00).
///
/// ## Business Reason
/// A sanity check on the share before it is handed to the payment
/// provider; anything above this is almost certainly a data error.
pub const MAX_PAYMENT_CENTS: i64 = 10_000_000;

/// Tip applied when the request omits one or sends an invalid value.
pub const DEFAULT_TIP_PERCENT: u32 = 20;
