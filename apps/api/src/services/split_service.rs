//! Split service implementation.
//!
//! Every settlement flow of SplitPay: create, view, join, invite, checkout
//! and payment confirmation. Handlers validate input; this service applies
//! the rules from `splitpay_core` and persists through `splitpay_db`.
//!
//! ## Write Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Split Write Paths                               │
//! │                                                                         │
//! │  create_split ─────────► SplitRepository::create (one transaction)     │
//! │                                                                         │
//! │  join_split ───┐                                                        │
//! │  send_invite ──┤                                                        │
//! │  create_payment_session ──► lock(split) ──► read ──► rule ──► write    │
//! │  handle_payment_event ─┘         │                            │         │
//! │                                  └──────── commit ◄───────────┘         │
//! │                                                                         │
//! │  Concurrent writers to one split queue on the lock; the reads inside   │
//! │  always see the latest committed participants. Provider calls run      │
//! │  between two short transactions, never inside one.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::ApiResult;
use crate::providers::{CheckoutRequest, Identity, PaymentEvent};
use crate::views::SplitView;
use crate::AppState;
use splitpay_core::lifecycle::{
    ensure_can_add_participant, ensure_payable, invite_message, reshare_for_newcomer, share_link,
    JoinMode,
};
use splitpay_core::shares::{compute_mixed_shares, compute_total};
use splitpay_core::validation::ParticipantInput;
use splitpay_core::{
    CoreError, Money, Participant, ParticipantStatus, Percentage, SmsStatus, Split, User,
    ValidationError,
};
use splitpay_db::{DbError, NewParticipant, NewSplit, NewUser, SplitTx};

/// How many splits the history endpoint returns.
pub const HISTORY_LIMIT: i64 = 100;

/// A validated create-split request.
#[derive(Debug, Clone)]
pub struct CreateSplitInput {
    pub subtotal: Money,
    pub tip: Percentage,
    pub platform_fee: Percentage,
    pub restaurant_name: Option<String>,
    pub participants: Vec<ParticipantInput>,
}

/// Result of creating a split.
#[derive(Debug, Clone)]
pub struct CreatedSplit {
    pub split: SplitView,
    pub share_link: String,
}

/// Split service.
pub struct SplitService {
    state: AppState,
}

impl SplitService {
    /// Create a new split service.
    pub fn new(state: AppState) -> Self {
        SplitService { state }
    }

    /// Finds or creates the local user for a verified identity.
    async fn current_user(&self, identity: &Identity) -> ApiResult<User> {
        let user = self
            .state
            .db
            .users()
            .get_or_create(&NewUser {
                external_id: identity.subject.clone(),
                name: identity.name.clone(),
                email: identity.email.clone(),
                phone: identity.phone.clone(),
            })
            .await?;
        Ok(user)
    }

    /// Locks a split, mapping a vanished split to 404.
    async fn lock(&self, split_id: &str) -> ApiResult<SplitTx> {
        match self.state.db.splits().lock(split_id).await {
            Ok(tx) => Ok(tx),
            Err(e) if e.is_not_found() => Err(CoreError::SplitNotFound(split_id.to_string()).into()),
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// The caller's splits, newest first.
    pub async fn list_my_splits(&self, identity: &Identity) -> ApiResult<Vec<SplitView>> {
        let user = self.current_user(identity).await?;
        let repo = self.state.db.splits();

        let splits = repo.list_by_creator(&user.id, HISTORY_LIMIT).await?;
        let mut by_split: HashMap<String, Vec<_>> = HashMap::new();
        for p in repo.participants_for_creator(&user.id, HISTORY_LIMIT).await? {
            by_split.entry(p.split_id.clone()).or_default().push(p);
        }

        debug!(user_id = %user.id, count = splits.len(), "Listed splits");

        Ok(splits
            .iter()
            .map(|split| {
                let participants = by_split.remove(&split.id).unwrap_or_default();
                SplitView::summary(split, &participants)
            })
            .collect())
    }

    /// A split by id or share code, as anyone with the link sees it.
    pub async fn get_split(&self, key: &str) -> ApiResult<SplitView> {
        let repo = self.state.db.splits();
        let split = repo
            .find_by_id_or_code(key)
            .await?
            .ok_or_else(|| CoreError::SplitNotFound(key.to_string()))?;

        let creator = self.state.db.users().get_by_id(&split.creator_id).await?;
        let participants = repo.participants(&split.id).await?;

        Ok(SplitView::public(&split, creator.as_ref(), &participants))
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Creates a split owned by the caller.
    ///
    /// Shares are fixed here: explicit amounts are kept and the rest of the
    /// total is divided equally among everyone else.
    pub async fn create_split(
        &self,
        identity: &Identity,
        input: CreateSplitInput,
    ) -> ApiResult<CreatedSplit> {
        let total = compute_total(input.subtotal, input.tip, input.platform_fee);
        let custom: Vec<Option<Money>> = input.participants.iter().map(|p| p.amount).collect();
        let shares = compute_mixed_shares(total, &custom)?;

        let user = self.current_user(identity).await?;

        let participants: Vec<NewParticipant> = input
            .participants
            .into_iter()
            .zip(shares)
            .map(|(p, amount)| {
                let is_creator = user.name.as_deref() == Some(p.name.as_str());
                NewParticipant {
                    custom_amount: p.amount.is_some(),
                    user_id: is_creator.then(|| user.id.clone()),
                    name: p.name,
                    phone: p.phone,
                    amount,
                    status: ParticipantStatus::Pending,
                }
            })
            .collect();

        let (split, participants) = self
            .state
            .db
            .splits()
            .create(
                &NewSplit {
                    creator_id: user.id.clone(),
                    subtotal: input.subtotal,
                    tip_percentage: i64::from(input.tip.whole_rounded()),
                    platform_fee_bps: i64::from(input.platform_fee.bps()),
                    total,
                    restaurant_name: input.restaurant_name,
                },
                &participants,
            )
            .await?;

        Ok(CreatedSplit {
            share_link: share_link(self.state.config.base_url(), &split.share_code),
            split: SplitView::owner(&split, &participants),
        })
    }

    // =========================================================================
    // Join
    // =========================================================================

    /// Claims a slot, adds a participant, or just returns the split.
    pub async fn join_split(
        &self,
        key: &str,
        identity: Option<&Identity>,
        mode: JoinMode,
    ) -> ApiResult<SplitView> {
        let split = self
            .state
            .db
            .splits()
            .find_by_id_or_code(key)
            .await?
            .ok_or_else(|| CoreError::SplitNotFound(key.to_string()))?;

        match mode {
            JoinMode::View => {}
            JoinMode::Claim { participant_id } => {
                // Resolve the user before locking; the lock holds a connection
                let user_id = match identity {
                    Some(identity) => Some(self.current_user(identity).await?.id),
                    None => None,
                };

                let mut tx = self.lock(&split.id).await?;
                let participant = tx
                    .participant(&participant_id)
                    .await?
                    .ok_or_else(|| CoreError::ParticipantNotFound(participant_id.clone()))?;

                let next = participant.status.advance(ParticipantStatus::Joined);
                tx.update_participant(&participant.id, next, user_id.as_deref())
                    .await?;
                tx.commit().await?;

                info!(
                    split_id = %split.id,
                    participant_id = %participant.id,
                    status = %next,
                    linked = user_id.is_some(),
                    "Participant claimed slot"
                );
            }
            JoinMode::AddNew { name, phone } => {
                let mut tx = self.lock(&split.id).await?;
                let existing = tx.participants().await?;
                ensure_can_add_participant(&split.id, &existing)?;

                let mut assignments = reshare_for_newcomer(split.total(), &existing)?;
                let newcomer = assignments
                    .pop()
                    .ok_or_else(|| CoreError::InvalidShares {
                        reason: "no share for the new participant".to_string(),
                    })?;

                for (p, share) in existing.iter().zip(&assignments) {
                    if p.amount() != share.amount || p.custom_amount != share.custom {
                        tx.set_share(&p.id, share.amount, share.custom).await?;
                    }
                }

                let added = tx
                    .add_participant(&NewParticipant {
                        name,
                        phone,
                        amount: newcomer.amount,
                        custom_amount: false,
                        status: ParticipantStatus::Joined,
                        user_id: None,
                    })
                    .await?;
                tx.refresh_status().await?;
                tx.commit().await?;

                info!(
                    split_id = %split.id,
                    participant_id = %added.id,
                    participants = existing.len() + 1,
                    share_cents = newcomer.amount.cents(),
                    "Participant joined, shares recomputed"
                );
            }
        }

        self.get_split(&split.id).await
    }

    // =========================================================================
    // Invite
    // =========================================================================

    /// Texts a participant their share link. Only the split's creator may.
    ///
    /// Returns whether the provider accepted the message. A failed send is
    /// logged and recorded but is not an error.
    pub async fn send_invite(
        &self,
        identity: &Identity,
        split_id: &str,
        participant_id: &str,
    ) -> ApiResult<bool> {
        let user = self.current_user(identity).await?;
        let repo = self.state.db.splits();

        let split = repo
            .get_by_id(split_id)
            .await?
            .ok_or_else(|| CoreError::SplitNotFound(split_id.to_string()))?;

        if split.creator_id != user.id {
            return Err(CoreError::Forbidden {
                reason: format!("user {} does not own split {}", user.id, split.id),
            }
            .into());
        }

        let participant = repo
            .participants(&split.id)
            .await?
            .into_iter()
            .find(|p| p.id == participant_id)
            .ok_or_else(|| CoreError::ParticipantNotFound(participant_id.to_string()))?;

        let phone = participant
            .phone
            .clone()
            .ok_or(CoreError::Validation(ValidationError::MissingPhone))?;

        let link = share_link(self.state.config.base_url(), &split.share_code);
        let message = invite_message(
            &participant.name,
            user.name.as_deref(),
            split.restaurant_name.as_deref(),
            participant.amount(),
            &link,
        );

        let (message_id, status) = match self.state.messaging.send_sms(&phone, &message).await {
            Ok(id) => (Some(id), SmsStatus::Sent),
            Err(e) => {
                warn!(split_id = %split.id, participant_id = %participant.id, error = %e, "SMS invite failed");
                (None, SmsStatus::Failed)
            }
        };

        self.state
            .db
            .sms_logs()
            .record(&split.id, &phone, &message, message_id.as_deref(), status)
            .await?;

        let delivered = status == SmsStatus::Sent;
        if delivered {
            let mut tx = self.lock(&split.id).await?;
            if let Some(current) = tx.participant(&participant.id).await? {
                let next = current.status.advance(ParticipantStatus::Invited);
                if next != current.status {
                    tx.update_participant(&current.id, next, None).await?;
                }
            }
            tx.commit().await?;
        }

        info!(split_id = %split.id, participant_id = %participant.id, delivered, "Invite processed");
        Ok(delivered)
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Opens a hosted checkout for one participant's share and returns its
    /// URL.
    ///
    /// ```text
    /// lock ─► check payable ─► commit
    ///                             │
    ///                             ▼
    ///                 provider call (no lock held)
    ///                             │
    ///                             ▼
    /// lock ─► same share, still unpaid? ─► store session id ─► commit
    /// ```
    ///
    /// SQLite's write lock is database-wide, so it is never held across the
    /// provider call. A share that changed in between is reported as
    /// [`CoreError::ShareChanged`] and the new session is not stored.
    pub async fn create_payment_session(
        &self,
        key: &str,
        participant_id: &str,
    ) -> ApiResult<String> {
        let split = self
            .state
            .db
            .splits()
            .find_by_id_or_code(key)
            .await?
            .ok_or_else(|| CoreError::SplitNotFound(key.to_string()))?;

        let mut tx = self.lock(&split.id).await?;
        let participant = tx
            .participant(participant_id)
            .await?
            .ok_or_else(|| CoreError::ParticipantNotFound(participant_id.to_string()))?;
        let amount = ensure_payable(&participant)?;
        tx.commit().await?;

        let request = checkout_request(self.state.config.base_url(), &split, &participant, amount);
        let session = self.state.payments.create_checkout_session(&request).await?;

        let mut tx = self.lock(&split.id).await?;
        let current = tx
            .participant(&participant.id)
            .await?
            .ok_or_else(|| CoreError::ParticipantNotFound(participant.id.clone()))?;
        if ensure_payable(&current)? != amount {
            warn!(
                split_id = %split.id,
                participant_id = %participant.id,
                session_id = %session.id,
                "Share changed during checkout, session discarded"
            );
            return Err(CoreError::ShareChanged {
                participant_id: participant.id,
            }
            .into());
        }
        tx.set_payment_session(&participant.id, &session.id).await?;
        tx.commit().await?;

        info!(
            split_id = %split.id,
            participant_id = %participant.id,
            amount_cents = amount.cents(),
            "Checkout session created"
        );

        Ok(session.url)
    }

    // =========================================================================
    // Payment Events
    // =========================================================================

    /// Applies a verified payment event.
    ///
    /// Redelivered events are harmless: a PAID participant stays PAID and the
    /// split status is derived again from the same data.
    pub async fn handle_payment_event(&self, event: PaymentEvent) -> ApiResult<()> {
        match event {
            PaymentEvent::CheckoutCompleted {
                session_id,
                payment_intent_id,
                split_id,
                participant_id,
            } => {
                let Some((split_id, participant_id)) = self
                    .resolve_target(split_id, participant_id, Some(&session_id), None)
                    .await?
                else {
                    warn!(session_id = %session_id, "Completed checkout matches no participant");
                    return Ok(());
                };

                let Some(mut tx) = self.lock_for_event(&split_id).await? else {
                    return Ok(());
                };
                let Some(participant) = tx.participant(&participant_id).await? else {
                    warn!(split_id = %split_id, participant_id = %participant_id, "Completed checkout for unknown participant");
                    return Ok(());
                };

                if participant.status.can_transition_to(ParticipantStatus::Paid) {
                    tx.mark_paid(
                        &participant.id,
                        Some(&session_id),
                        payment_intent_id.as_deref(),
                        Utc::now(),
                    )
                    .await?;
                } else {
                    debug!(participant_id = %participant.id, "Participant already paid, event ignored");
                }

                let status = tx.refresh_status().await?;
                tx.commit().await?;

                info!(
                    split_id = %split_id,
                    participant_id = %participant_id,
                    split_status = ?status,
                    "Payment completed"
                );
            }
            PaymentEvent::PaymentFailed {
                payment_intent_id,
                split_id,
                participant_id,
            } => {
                let Some((split_id, participant_id)) = self
                    .resolve_target(split_id, participant_id, None, Some(&payment_intent_id))
                    .await?
                else {
                    debug!(payment_intent_id = %payment_intent_id, "Failed payment matches no participant");
                    return Ok(());
                };

                let Some(mut tx) = self.lock_for_event(&split_id).await? else {
                    return Ok(());
                };
                let Some(participant) = tx.participant(&participant_id).await? else {
                    return Ok(());
                };

                let has_session = participant.payment_session_id.is_some()
                    || participant.payment_intent_id.is_some();
                let next = participant.status.advance(ParticipantStatus::Failed);
                if has_session && next != participant.status {
                    tx.update_participant(&participant.id, next, None).await?;
                    tx.commit().await?;
                    info!(split_id = %split_id, participant_id = %participant_id, "Payment failed");
                }
            }
            PaymentEvent::Other { kind } => {
                debug!(event_type = %kind, "Ignoring payment event");
            }
        }

        Ok(())
    }

    /// Picks the participant an event refers to: checkout metadata first,
    /// then the stored provider ids.
    async fn resolve_target(
        &self,
        split_id: Option<String>,
        participant_id: Option<String>,
        session_id: Option<&str>,
        intent_id: Option<&str>,
    ) -> ApiResult<Option<(String, String)>> {
        if let (Some(split_id), Some(participant_id)) = (split_id, participant_id) {
            return Ok(Some((split_id, participant_id)));
        }

        let found = self
            .state
            .db
            .splits()
            .find_participant_by_payment_ref(session_id, intent_id)
            .await?;
        Ok(found.map(|p| (p.split_id, p.id)))
    }

    /// Locks the split an event names. A split that no longer exists is
    /// logged and skipped so the provider stops redelivering.
    async fn lock_for_event(&self, split_id: &str) -> ApiResult<Option<SplitTx>> {
        match self.state.db.splits().lock(split_id).await {
            Ok(tx) => Ok(Some(tx)),
            Err(DbError::NotFound { .. }) => {
                warn!(split_id = %split_id, "Payment event for unknown split");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// The hosted checkout for one share.
fn checkout_request(
    base: &str,
    split: &Split,
    participant: &Participant,
    amount: Money,
) -> CheckoutRequest {
    CheckoutRequest {
        split_id: split.id.clone(),
        participant_id: participant.id.clone(),
        amount,
        product_name: format!(
            "Split: {}",
            split
                .restaurant_name
                .as_deref()
                .filter(|r| !r.is_empty())
                .unwrap_or("Bill Split")
        ),
        description: format!("Your share of the bill ({})", participant.name),
        success_url: format!(
            "{}/split/success?session_id={{CHECKOUT_SESSION_ID}}&split_id={}&participant_id={}",
            base, split.id, participant.id
        ),
        cancel_url: format!("{}/join/{}?cancelled=true", base, split.share_code),
    }
}
