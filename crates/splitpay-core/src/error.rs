//! # Error Types
//!
//! Domain-specific error types for splitpay-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  splitpay-core errors (this file)                                      │
//! │  ├── CoreError        - Settlement rule violations                     │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  splitpay-db errors (separate crate)                                   │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  apps/api errors                                                       │
//! │  └── ApiError         - What the HTTP client sees ({"error": ...})     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ApiError → JSON response          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Messages are safe to show to end users (no internal detail)
//! 3. Errors are enum variants, never String
//! 4. Each variant maps to exactly one HTTP status in the API layer

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Settlement rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No split with this id or share code.
    #[error("Split not found")]
    SplitNotFound(String),

    /// No participant with this id inside the split.
    #[error("Participant not found")]
    ParticipantNotFound(String),

    /// Caller is authenticated but does not own the split.
    ///
    /// ## When This Occurs
    /// - Someone other than the creator tries to send an SMS invite
    #[error("Unauthorized")]
    Forbidden { reason: String },

    /// The split already holds the maximum number of participants.
    #[error("Maximum participants reached")]
    CapacityReached { max: usize },

    /// The participant has already paid their share.
    ///
    /// ## User Workflow
    /// ```text
    /// Pay button (second tab)
    ///      │
    ///      ▼
    /// participant.status == PAID?
    ///      │
    ///      ▼
    /// AlreadyPaid ──► 400 "Already paid", no checkout session created
    /// ```
    #[error("Already paid")]
    AlreadyPaid { participant_id: String },

    /// The share was re-split while its checkout session was being created.
    /// The session is discarded; paying again uses the new amount.
    #[error("Share changed, please try again")]
    ShareChanged { participant_id: String },

    /// Membership can no longer change because money has been collected.
    #[error("Split already has payments; participants can no longer be added")]
    PaymentsRecorded { split_id: String },

    /// Custom amounts cannot be reconciled with the split total.
    #[error("Invalid participant amounts: {reason}")]
    InvalidShares { reason: String },

    /// Share is outside the range a checkout session may carry.
    #[error("Invalid amount")]
    InvalidPaymentAmount { reason: String },

    /// Validation error (wraps ValidationError).
    #[error("{0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when request input doesn't meet requirements.
/// They are raised before any persistence or provider call.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A value failed validation outright.
    ///
    /// `field` is phrased for display: "bill amount", "participants data",
    /// "split ID" and so on.
    #[error("Invalid {field}")]
    Invalid { field: String },

    /// The participant cannot be texted.
    #[error("Participant has no phone number")]
    MissingPhone,
}

impl ValidationError {
    /// Shorthand for [`ValidationError::Invalid`].
    pub fn invalid(field: impl Into<String>) -> Self {
        ValidationError::Invalid {
            field: field.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
