//! # Split Lifecycle Rules
//!
//! The settlement state machine as pure functions. The API service loads
//! rows, asks this module what should happen, and writes the answer back
//! inside a transaction.
//!
//! ## State Machines
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Participant                                                            │
//! │                                                                         │
//! │   PENDING ──invite sent──► INVITED ──claim/join──► JOINED               │
//! │      │                        │                      │                  │
//! │      └──────claim/join────────┼──────────────────────┤                  │
//! │                               │                      │                  │
//! │      any non-PAID ──payment failed──► FAILED ──claim──► JOINED          │
//! │      any non-PAID ──payment completed──► PAID  (terminal, exactly once) │
//! │                                                                         │
//! │  Split (derived, never written by hand)                                 │
//! │                                                                         │
//! │   COLLECTING ──every participant PAID──► COMPLETED                      │
//! │                                                                         │
//! │  Joins are refused once any participant is PAID, and PAID never         │
//! │  regresses, so COMPLETED is never left again.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::shares::{compute_equal_shares, compute_mixed_shares};
use crate::types::{Participant, ParticipantStatus, SplitStatus};
use crate::{MAX_PARTICIPANTS, MAX_PAYMENT_CENTS};

// =============================================================================
// Status Derivation
// =============================================================================

/// Derives the split status from its participants.
///
/// `COMPLETED` iff there is at least one participant and all of them are
/// `PAID`. An empty split is still collecting.
pub fn derive_split_status<I>(statuses: I) -> SplitStatus
where
    I: IntoIterator<Item = ParticipantStatus>,
{
    let mut any = false;
    for status in statuses {
        if status != ParticipantStatus::Paid {
            return SplitStatus::Collecting;
        }
        any = true;
    }

    if any {
        SplitStatus::Completed
    } else {
        SplitStatus::Collecting
    }
}

/// Sum of the shares already paid.
pub fn collected_amount(participants: &[Participant]) -> Money {
    participants
        .iter()
        .filter(|p| p.is_paid())
        .map(Participant::amount)
        .sum()
}

// =============================================================================
// Participant Transitions
// =============================================================================

impl ParticipantStatus {
    /// True once the participant has paid. Nothing leaves this state.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, ParticipantStatus::Paid)
    }

    /// Whether moving from `self` to `next` is a legal step.
    ///
    /// Staying in the same state is not a transition and returns false.
    pub fn can_transition_to(&self, next: ParticipantStatus) -> bool {
        use ParticipantStatus::*;

        if self.is_terminal() || *self == next {
            return false;
        }

        match next {
            Paid | Failed => true,
            Invited => *self == Pending,
            Joined => matches!(self, Pending | Invited | Failed),
            Pending => false,
        }
    }

    /// Returns `next` when the step is legal, otherwise stays put.
    ///
    /// ## Example
    /// ```rust
    /// use splitpay_core::ParticipantStatus;
    ///
    /// assert_eq!(ParticipantStatus::Pending.advance(ParticipantStatus::Joined), ParticipantStatus::Joined);
    /// // A late claim never undoes a payment
    /// assert_eq!(ParticipantStatus::Paid.advance(ParticipantStatus::Joined), ParticipantStatus::Paid);
    /// // Invites don't pull a joined participant backwards
    /// assert_eq!(ParticipantStatus::Joined.advance(ParticipantStatus::Invited), ParticipantStatus::Joined);
    /// ```
    #[must_use]
    pub fn advance(self, next: ParticipantStatus) -> ParticipantStatus {
        if self.can_transition_to(next) {
            next
        } else {
            self
        }
    }
}

// =============================================================================
// Guards
// =============================================================================

/// Checks that a participant's share may be sent to checkout.
///
/// Returns the amount to charge.
///
/// ## Errors
/// - [`CoreError::AlreadyPaid`] when the participant has paid
/// - [`CoreError::InvalidPaymentAmount`] when the share is not positive or
///   exceeds [`MAX_PAYMENT_CENTS`]
pub fn ensure_payable(participant: &Participant) -> CoreResult<Money> {
    if participant.is_paid() {
        return Err(CoreError::AlreadyPaid {
            participant_id: participant.id.clone(),
        });
    }

    let amount = participant.amount();
    if !amount.is_positive() {
        return Err(CoreError::InvalidPaymentAmount {
            reason: format!("share {} is not positive", amount),
        });
    }
    if amount.cents() > MAX_PAYMENT_CENTS {
        return Err(CoreError::InvalidPaymentAmount {
            reason: format!("share {} exceeds the checkout limit", amount),
        });
    }

    Ok(amount)
}

/// Checks that one more participant may join.
///
/// ## Errors
/// - [`CoreError::CapacityReached`] at [`MAX_PARTICIPANTS`]
/// - [`CoreError::PaymentsRecorded`] once anyone has paid, because a re-split
///   would change amounts that were already charged
pub fn ensure_can_add_participant(split_id: &str, current: &[Participant]) -> CoreResult<()> {
    if current.len() >= MAX_PARTICIPANTS {
        return Err(CoreError::CapacityReached {
            max: MAX_PARTICIPANTS,
        });
    }

    if current.iter().any(Participant::is_paid) {
        return Err(CoreError::PaymentsRecorded {
            split_id: split_id.to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Re-split on Join
// =============================================================================

/// One participant's share after a re-split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShareAssignment {
    pub amount: Money,
    pub custom: bool,
}

/// Recomputes every share when a newcomer joins.
///
/// Returns one assignment per existing participant, in order, followed by the
/// newcomer's.
///
/// ## Policy
/// ```text
/// residual = total - Σ existing custom amounts
///
/// residual > 0   → customs kept, residual shared by the non-custom
///                  participants and the newcomer
/// residual ≤ 0   → nothing left for the newcomer: everyone falls back
///                  to an equal share, custom flags cleared
/// ```
pub fn reshare_for_newcomer(
    total: Money,
    existing: &[Participant],
) -> CoreResult<Vec<ShareAssignment>> {
    let mut custom: Vec<Option<Money>> = existing
        .iter()
        .map(|p| p.custom_amount.then(|| p.amount()))
        .collect();
    custom.push(None);

    let allocated: Money = custom.iter().flatten().sum();
    if (total - allocated).is_positive() {
        let shares = compute_mixed_shares(total, &custom)?;
        return Ok(shares
            .into_iter()
            .zip(custom)
            .map(|(amount, c)| ShareAssignment {
                amount,
                custom: c.is_some(),
            })
            .collect());
    }

    Ok(compute_equal_shares(total, custom.len())?
        .into_iter()
        .map(|amount| ShareAssignment {
            amount,
            custom: false,
        })
        .collect())
}

// =============================================================================
// Join Requests
// =============================================================================

/// What a join request asks for, after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinMode {
    /// Take over an existing participant slot.
    Claim { participant_id: String },
    /// Add a new participant and re-split.
    AddNew { name: String, phone: Option<String> },
    /// Nothing to do; the split is returned unchanged.
    View,
}

impl JoinMode {
    /// Resolves a join request.
    ///
    /// `action` defaults to `"join"`; anything else is rejected. A
    /// participant id wins over a name.
    pub fn resolve(
        action: Option<&str>,
        participant_id: Option<String>,
        name: String,
        phone: Option<String>,
    ) -> Result<JoinMode, ValidationError> {
        if action.unwrap_or("join") != "join" {
            return Err(ValidationError::invalid("action"));
        }

        Ok(match (participant_id, name.is_empty()) {
            (Some(participant_id), _) => JoinMode::Claim { participant_id },
            (None, false) => JoinMode::AddNew { name, phone },
            (None, true) => JoinMode::View,
        })
    }
}

// =============================================================================
// Links and Messages
// =============================================================================

/// Public link a participant opens to join and pay.
pub fn share_link(base_url: &str, share_code: &str) -> String {
    format!("{}/join/{}", base_url.trim_end_matches('/'), share_code)
}

/// Body of the SMS invite.
///
/// ## Example
/// ```rust
/// use splitpay_core::lifecycle::invite_message;
/// use splitpay_core::Money;
///
/// let text = invite_message("Ben", Some("Ana"), Some("Tacos"), Money::from_cents(3_000), "https://x/join/k3x9");
/// assert_eq!(
///     text,
///     "Hey Ben! Ana invited you to split a bill at Tacos. Your share is $30.00. Pay here: https://x/join/k3x9"
/// );
/// ```
pub fn invite_message(
    participant_name: &str,
    creator_name: Option<&str>,
    restaurant_name: Option<&str>,
    amount: Money,
    link: &str,
) -> String {
    let creator = creator_name.filter(|n| !n.is_empty()).unwrap_or("Someone");
    let venue = restaurant_name
        .filter(|r| !r.is_empty())
        .map(|r| format!(" at {}", r))
        .unwrap_or_default();

    format!(
        "Hey {}! {} invited you to split a bill{}. Your share is {}. Pay here: {}",
        participant_name, creator, venue, amount, link
    )
}

// =============================================================================
// Unit Tests
// =============================================================================
