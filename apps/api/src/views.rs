//! Response bodies.
//!
//! Monetary values go out twice: as a decimal string (`"30.00"`) for display
//! and as integer cents for arithmetic on the client. Nothing here is a
//! float.
//!
//! These types are the web client's contract: `cargo test` writes their
//! TypeScript definitions (and those of the status enums they embed) to
//! `bindings/`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use ts_rs::TS;

use splitpay_core::lifecycle::collected_amount;
use splitpay_core::{Money, Participant, ParticipantStatus, Split, SplitStatus, User};

/// A split as returned by the API.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SplitView {
    pub id: String,
    pub share_code: String,
    pub creator_id: String,
    pub bill_amount: String,
    #[ts(type = "number")]
    pub bill_amount_cents: i64,
    #[ts(type = "number")]
    pub tip_percentage: i64,
    /// Platform fee as a percentage string ("2.90").
    pub platform_fee: String,
    pub total_amount: String,
    #[ts(type = "number")]
    pub total_amount_cents: i64,
    pub restaurant_name: Option<String>,
    pub status: SplitStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub creator: Option<CreatorView>,
    /// Sum of the paid shares.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub collected_amount: Option<String>,
    pub participants: Vec<ParticipantView>,
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct CreatorView {
    pub id: String,
    pub name: Option<String>,
}

/// One participant. Which fields are present depends on who is asking.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub phone: Option<String>,
    pub amount: String,
    #[ts(type = "number")]
    pub amount_cents: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub custom_amount: Option<bool>,
    pub status: ParticipantStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional, as = "Option<String>")]
    pub paid_at: Option<DateTime<Utc>>,
}

impl ParticipantView {
    /// Everything, for the split's creator.
    pub fn full(p: &Participant) -> Self {
        ParticipantView {
            phone: p.phone.clone(),
            custom_amount: Some(p.custom_amount),
            user_id: p.user_id.clone(),
            ..ParticipantView::public(p)
        }
    }

    /// What anyone holding the share link may see. No phone numbers.
    pub fn public(p: &Participant) -> Self {
        ParticipantView {
            paid_at: p.paid_at,
            ..ParticipantView::summary(p)
        }
    }

    /// Id, name, amount and status only.
    pub fn summary(p: &Participant) -> Self {
        ParticipantView {
            id: p.id.clone(),
            name: p.name.clone(),
            phone: None,
            amount: p.amount().to_decimal_string(),
            amount_cents: p.amount_cents,
            custom_amount: None,
            status: p.status,
            user_id: None,
            paid_at: None,
        }
    }
}

impl SplitView {
    fn base(split: &Split, participants: Vec<ParticipantView>) -> Self {
        SplitView {
            id: split.id.clone(),
            share_code: split.share_code.clone(),
            creator_id: split.creator_id.clone(),
            bill_amount: split.subtotal().to_decimal_string(),
            bill_amount_cents: split.subtotal_cents,
            tip_percentage: split.tip_percentage,
            platform_fee: format_bps(split.platform_fee_bps),
            total_amount: split.total().to_decimal_string(),
            total_amount_cents: split.total_cents,
            restaurant_name: split.restaurant_name.clone(),
            status: split.status,
            created_at: split.created_at,
            updated_at: split.updated_at,
            creator: None,
            collected_amount: None,
            participants,
        }
    }

    /// The creator's view right after creation.
    pub fn owner(split: &Split, participants: &[Participant]) -> Self {
        SplitView::base(split, participants.iter().map(ParticipantView::full).collect())
    }

    /// The public view behind the share link.
    pub fn public(split: &Split, creator: Option<&User>, participants: &[Participant]) -> Self {
        let mut view = SplitView::base(
            split,
            participants.iter().map(ParticipantView::public).collect(),
        );
        view.creator = creator.map(|u| CreatorView {
            id: u.id.clone(),
            name: u.name.clone(),
        });
        view.collected_amount = Some(collected_amount(participants).to_decimal_string());
        view
    }

    /// A row of the creator's history.
    pub fn summary(split: &Split, participants: &[Participant]) -> Self {
        SplitView::base(
            split,
            participants.iter().map(ParticipantView::summary).collect(),
        )
    }
}

/// Basis points as a percentage string: 290 → "2.90".
fn format_bps(bps: i64) -> String {
    Money::from_cents(bps).to_decimal_string()
}
