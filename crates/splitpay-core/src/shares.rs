//! # Share Computation
//!
//! How a bill becomes a total and the total becomes per-person shares.
//!
//! ## Calculation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Share Calculation Pipeline                          │
//! │                                                                         │
//! │  subtotal: $100.00    tip: 20%    fee: 0%                               │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  compute_total:  100.00 × (1 + 0.20 + 0.00)  ──► $120.00                │
//! │        │         (one rounding step, half up)                           │
//! │        ▼                                                                │
//! │  ┌─────────────────────────┐    ┌─────────────────────────────────┐    │
//! │  │ compute_equal_shares    │    │ compute_mixed_shares            │    │
//! │  │ 4 people → 30.00 × 4    │    │ Ana: custom 50.00               │    │
//! │  │                         │    │ Ben, Cy: (120 - 50) / 2 = 35.00 │    │
//! │  └─────────────────────────┘    └─────────────────────────────────┘    │
//! │                                                                         │
//! │  INVARIANT: shares always sum to the total, to the cent                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::Percentage;

/// Computes the split total from subtotal, tip and platform fee.
///
/// Tip and fee are both charged on the subtotal, so the combined rate is
/// applied once and rounded once. Rounding tip and fee separately could
/// drift by a cent.
///
/// ## Example
/// ```rust
/// use splitpay_core::money::Money;
/// use splitpay_core::shares::compute_total;
/// use splitpay_core::types::Percentage;
///
/// let total = compute_total(
///     Money::from_cents(4_550),
///     Percentage::from_whole(18),
///     Percentage::from_bps(290),
/// );
/// // 45.50 × 1.209 = 55.0095 → 55.01
/// assert_eq!(total.cents(), 5_501);
/// ```
pub fn compute_total(subtotal: Money, tip: Percentage, platform_fee: Percentage) -> Money {
    subtotal + subtotal.percentage_of(tip + platform_fee)
}

/// Splits a total equally across `count` participants.
///
/// Leftover cents go one each to the first participants in order.
///
/// ## Errors
/// [`CoreError::InvalidShares`] when `count` is zero.
pub fn compute_equal_shares(total: Money, count: usize) -> CoreResult<Vec<Money>> {
    if count == 0 {
        return Err(CoreError::InvalidShares {
            reason: "a split needs at least one participant".to_string(),
        });
    }

    Ok(total.split_evenly(count))
}

/// Computes shares when some participants name their own amount.
///
/// `custom[i]` is `Some(amount)` for a participant with an explicit share and
/// `None` for one who takes an equal part of what remains.
///
/// ## Rules
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  residual = total - Σ custom                                            │
/// │                                                                         │
/// │  residual < 0                       → InvalidShares (over-allocated)    │
/// │  nobody flexible, residual ≠ 0      → InvalidShares (doesn't add up)    │
/// │  nobody flexible, residual = 0      → customs as given                  │
/// │  otherwise                          → residual split evenly among the   │
/// │                                       flexible ones, in list order      │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
///
/// ## Example
/// ```rust
/// use splitpay_core::money::Money;
/// use splitpay_core::shares::compute_mixed_shares;
///
/// let shares = compute_mixed_shares(
///     Money::from_cents(12_000),
///     &[Some(Money::from_cents(5_000)), None, None],
/// )
/// .unwrap();
/// let cents: Vec<i64> = shares.iter().map(|m| m.cents()).collect();
/// assert_eq!(cents, vec![5_000, 3_500, 3_500]);
/// ```
pub fn compute_mixed_shares(total: Money, custom: &[Option<Money>]) -> CoreResult<Vec<Money>> {
    if custom.is_empty() {
        return compute_equal_shares(total, 0);
    }

    let allocated: Money = custom.iter().flatten().sum();
    let residual = total - allocated;

    if residual.is_negative() {
        return Err(CoreError::InvalidShares {
            reason: format!("custom amounts exceed the total by {}", allocated - total),
        });
    }

    let flexible = custom.iter().filter(|c| c.is_none()).count();
    if flexible == 0 {
        if !residual.is_zero() {
            return Err(CoreError::InvalidShares {
                reason: format!("custom amounts leave {} unassigned", residual),
            });
        }
        return Ok(custom.iter().flatten().copied().collect());
    }

    let mut equal = residual.split_evenly(flexible).into_iter();
    Ok(custom
        .iter()
        .map(|c| match c {
            Some(amount) => *amount,
            // split_evenly yields exactly `flexible` shares
            None => equal.next().unwrap_or_default(),
        })
        .collect())
}

// =============================================================================
// Unit Tests
// =============================================================================
