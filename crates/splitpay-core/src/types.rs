//! # Domain Types
//!
//! Core domain types used throughout SplitPay.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      User       │   │      Split      │   │  Participant    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │◄──│  creator_id     │◄──│  split_id (FK)  │       │
//! │  │  external_id    │   │  share_code     │   │  amount_cents   │       │
//! │  │  name/email     │   │  total_cents    │   │  status         │       │
//! │  └─────────────────┘   │  status         │   │  session id     │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! │                                 ▲                                       │
//! │  ┌─────────────────┐   ┌───────┴─────────┐   ┌─────────────────┐       │
//! │  │   Percentage    │   │     SmsLog      │   │ParticipantStatus│       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  bps (u32)      │   │  split_id (FK)  │   │  Pending        │       │
//! │  │  2000 = 20%     │   │  phone, message │   │  Invited        │       │
//! │  └─────────────────┘   │  status         │   │  Joined         │       │
//! │                        └─────────────────┘   │  Paid / Failed  │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! A split has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - `share_code`: short public code used in `/join/{code}` links
//!
//! Both resolve to the same split wherever an id is accepted in a path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::Add;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Percentage
// =============================================================================

/// A percentage represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000, so a 12.5% tip or a 2.9% fee stays an
/// integer and total computation never touches floating point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Percentage(u32);

impl Percentage {
    /// Creates a percentage from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Percentage(bps)
    }

    /// Creates a percentage from a whole number (20 → 20%).
    #[inline]
    pub const fn from_whole(pct: u32) -> Self {
        Percentage(pct * 100)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the percentage rounded half up to a whole number.
    ///
    /// Splits store the tip as an integer percentage.
    #[inline]
    pub const fn whole_rounded(&self) -> u32 {
        (self.0 + 50) / 100
    }

    /// Zero percent.
    #[inline]
    pub const fn zero() -> Self {
        Percentage(0)
    }
}

impl Default for Percentage {
    fn default() -> Self {
        Percentage::zero()
    }
}

impl Add for Percentage {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Percentage(self.0 + other.0)
    }
}

// =============================================================================
// Split Status
// =============================================================================

/// The settlement status of a split.
///
/// Derived from participant state, never set directly by callers.
/// See [`crate::lifecycle::derive_split_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SplitStatus {
    /// At least one participant has not paid.
    #[default]
    Collecting,
    /// Every participant has paid.
    Completed,
}

// =============================================================================
// Participant Status
// =============================================================================

/// Where one participant stands in the settlement flow.
///
/// ```text
///  PENDING ──► INVITED ──► JOINED ──► PAID
///     │           │           │
///     └───────────┴───────────┴──► FAILED ──► PAID (retry)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticipantStatus {
    /// Added, nothing sent yet.
    #[default]
    Pending,
    /// SMS invite dispatched.
    Invited,
    /// Claimed the slot or joined through the share link.
    Joined,
    /// Payment confirmed by the provider webhook.
    Paid,
    /// The provider reported the payment attempt as failed.
    Failed,
}

impl ParticipantStatus {
    /// Stable upper-case label, matching the stored value.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ParticipantStatus::Pending => "PENDING",
            ParticipantStatus::Invited => "INVITED",
            ParticipantStatus::Joined => "JOINED",
            ParticipantStatus::Paid => "PAID",
            ParticipantStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// User
// =============================================================================

/// A split creator, known through the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    /// Internal identifier (UUID v4).
    pub id: String,

    /// Subject id issued by the identity provider.
    pub external_id: String,

    /// Display name, if the provider supplied one.
    pub name: Option<String>,

    pub email: Option<String>,

    pub phone: Option<String>,

    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Split
// =============================================================================

/// One bill-splitting event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Split {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Public code used in share links.
    pub share_code: String,

    /// The user who created (and owns) the split.
    pub creator_id: String,

    /// Bill before tip and fee, in cents.
    pub subtotal_cents: i64,

    /// Tip as a whole percentage.
    pub tip_percentage: i64,

    /// Platform fee in basis points.
    pub platform_fee_bps: i64,

    /// subtotal + tip + fee, in cents. Fixed at creation.
    pub total_cents: i64,

    pub restaurant_name: Option<String>,

    pub status: SplitStatus,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Split {
    /// Returns the total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Returns the subtotal as Money.
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }
}

// =============================================================================
// Participant
// =============================================================================

/// One person's stake in a split.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Participant {
    pub id: String,
    pub split_id: String,
    pub name: String,
    pub phone: Option<String>,
    /// Owed amount in cents.
    pub amount_cents: i64,
    /// True when the amount was set explicitly rather than split equally.
    pub custom_amount: bool,
    pub status: ParticipantStatus,
    /// User who claimed this slot, if any.
    pub user_id: Option<String>,
    /// Checkout session created for this participant.
    pub payment_session_id: Option<String>,
    /// Payment intent reported by the provider on completion.
    pub payment_intent_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Participant {
    /// Returns the owed amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    #[inline]
    pub fn is_paid(&self) -> bool {
        self.status == ParticipantStatus::Paid
    }
}

// =============================================================================
// SMS Log
// =============================================================================

/// Outcome of one invite dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum SmsStatus {
    Sent,
    Failed,
}

/// Append-only audit record of one outbound invite.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SmsLog {
    pub id: String,
    pub split_id: String,
    pub phone: String,
    pub message: String,
    /// Message id returned by the provider; None when dispatch failed.
    pub provider_message_id: Option<String>,
    pub status: SmsStatus,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
