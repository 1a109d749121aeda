//! # Split Repository
//!
//! Database operations for splits and their participants.
//!
//! ## Split Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Split Lifecycle                                   │
//! │                                                                         │
//! │  1. CREATE                                                             │
//! │     └── create() → Split + Participants, one transaction               │
//! │                                                                         │
//! │  2. MUTATE (join, claim, invite, checkout, webhook)                    │
//! │     └── lock(split_id) → SplitTx                                       │
//! │         ├── touches the split row first: takes the write lock          │
//! │         ├── reads participants (fresh, nobody else can write)          │
//! │         ├── writes shares / statuses / payment ids                     │
//! │         ├── refresh_status() → COLLECTING | COMPLETED                  │
//! │         └── commit()   (drop without commit = rollback)                │
//! │                                                                         │
//! │  3. READ                                                               │
//! │     └── find_by_id_or_code() / participants() / list_by_creator()      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Why Lock First?
//! In WAL mode a transaction that reads before it writes can't upgrade once
//! another writer has committed; SQLite fails it with `SQLITE_BUSY` straight
//! away. Writing first makes a second writer wait on the busy timeout
//! instead, so two re-splits of the same bill run one after the other.

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use splitpay_core::lifecycle::derive_split_status;
use splitpay_core::{Money, Participant, ParticipantStatus, Split, SplitStatus};

/// Builds a participant SELECT with a fixed column list.
macro_rules! participant_select {
    ($tail:literal) => {
        concat!(
            "SELECT id, split_id, name, phone, amount_cents, custom_amount, status, user_id, ",
            "payment_session_id, payment_intent_id, paid_at, created_at ",
            "FROM split_participants ",
            $tail
        )
    };
}

/// Builds a split SELECT with a fixed column list.
macro_rules! split_select {
    ($tail:literal) => {
        concat!(
            "SELECT id, share_code, creator_id, subtotal_cents, tip_percentage, platform_fee_bps, ",
            "total_cents, restaurant_name, status, created_at, updated_at ",
            "FROM splits ",
            $tail
        )
    };
}

// =============================================================================
// Inputs
// =============================================================================

/// A split about to be inserted. Amounts are already computed.
#[derive(Debug, Clone)]
pub struct NewSplit {
    pub creator_id: String,
    pub subtotal: Money,
    /// Whole percent.
    pub tip_percentage: i64,
    pub platform_fee_bps: i64,
    pub total: Money,
    pub restaurant_name: Option<String>,
}

/// A participant about to be inserted.
#[derive(Debug, Clone)]
pub struct NewParticipant {
    pub name: String,
    pub phone: Option<String>,
    pub amount: Money,
    pub custom_amount: bool,
    pub status: ParticipantStatus,
    pub user_id: Option<String>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for split database operations.
#[derive(Debug, Clone)]
pub struct SplitRepository {
    pool: SqlitePool,
}

impl SplitRepository {
    /// Creates a new SplitRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SplitRepository { pool }
    }

    /// Inserts a split and all of its participants in one transaction.
    ///
    /// Participants keep the order given; that order decides who absorbs
    /// leftover cents on a later re-split.
    pub async fn create(
        &self,
        split: &NewSplit,
        participants: &[NewParticipant],
    ) -> DbResult<(Split, Vec<Participant>)> {
        let mut tx = self.pool.begin().await?;
        let now = super::now();

        let mut record = Split {
            id: Uuid::new_v4().to_string(),
            share_code: String::new(),
            creator_id: split.creator_id.clone(),
            subtotal_cents: split.subtotal.cents(),
            tip_percentage: split.tip_percentage,
            platform_fee_bps: split.platform_fee_bps,
            total_cents: split.total.cents(),
            restaurant_name: split.restaurant_name.clone(),
            status: SplitStatus::Collecting,
            created_at: now,
            updated_at: now,
        };

        // A share code collision is astronomically rare; retry a few times
        // rather than surface it
        let mut attempts = 0;
        loop {
            attempts += 1;
            record.share_code = generate_share_code();

            let inserted = sqlx::query(
                r#"
                INSERT INTO splits (
                    id, share_code, creator_id,
                    subtotal_cents, tip_percentage, platform_fee_bps, total_cents,
                    restaurant_name, status, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
            )
            .bind(&record.id)
            .bind(&record.share_code)
            .bind(&record.creator_id)
            .bind(record.subtotal_cents)
            .bind(record.tip_percentage)
            .bind(record.platform_fee_bps)
            .bind(record.total_cents)
            .bind(&record.restaurant_name)
            .bind(record.status)
            .bind(record.created_at)
            .bind(record.updated_at)
            .execute(&mut *tx)
            .await;

            match inserted.map_err(DbError::from) {
                Ok(_) => break,
                Err(DbError::UniqueViolation { field, .. })
                    if field.contains("share_code") && attempts < 5 =>
                {
                    debug!(attempts, "Share code collision, regenerating");
                }
                Err(e) => return Err(e),
            }
        }

        let mut created = Vec::with_capacity(participants.len());
        for (position, p) in participants.iter().enumerate() {
            created.push(insert_participant(&mut tx, &record.id, p, position as i64, now).await?);
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            split_id = %record.id,
            share_code = %record.share_code,
            participants = created.len(),
            total_cents = record.total_cents,
            "Split created"
        );

        Ok((record, created))
    }

    /// Gets a split by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Split>> {
        let split = sqlx::query_as::<_, Split>(split_select!("WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(split)
    }

    /// Gets a split by ID or by share code.
    pub async fn find_by_id_or_code(&self, key: &str) -> DbResult<Option<Split>> {
        let split = sqlx::query_as::<_, Split>(split_select!(
            "WHERE id = ?1 OR share_code = ?1 LIMIT 1"
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(split)
    }

    /// Lists a creator's splits, newest first.
    pub async fn list_by_creator(&self, creator_id: &str, limit: i64) -> DbResult<Vec<Split>> {
        let splits = sqlx::query_as::<_, Split>(split_select!(
            "WHERE creator_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2"
        ))
        .bind(creator_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(splits)
    }

    /// Participants of a split, in insertion order.
    pub async fn participants(&self, split_id: &str) -> DbResult<Vec<Participant>> {
        let participants = sqlx::query_as::<_, Participant>(participant_select!(
            "WHERE split_id = ?1 ORDER BY position, created_at"
        ))
        .bind(split_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(participants)
    }

    /// Participants of several splits, grouped by the caller.
    ///
    /// One query instead of one per split when listing a creator's history.
    pub async fn participants_for_creator(
        &self,
        creator_id: &str,
        limit: i64,
    ) -> DbResult<Vec<Participant>> {
        let participants = sqlx::query_as::<_, Participant>(participant_select!(
            r#"WHERE split_id IN (
                SELECT id FROM splits WHERE creator_id = ?1
                ORDER BY created_at DESC, rowid DESC LIMIT ?2
            )
            ORDER BY split_id, position, created_at"#
        ))
        .bind(creator_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(participants)
    }

    /// Finds the participant a payment provider event refers to.
    ///
    /// Matches on the checkout session id or the payment intent id, whichever
    /// the event carries.
    pub async fn find_participant_by_payment_ref(
        &self,
        session_id: Option<&str>,
        intent_id: Option<&str>,
    ) -> DbResult<Option<Participant>> {
        if session_id.is_none() && intent_id.is_none() {
            return Ok(None);
        }

        let participant = sqlx::query_as::<_, Participant>(participant_select!(
            r#"WHERE (?1 IS NOT NULL AND payment_session_id = ?1)
                  OR (?2 IS NOT NULL AND payment_intent_id = ?2)
            LIMIT 1"#
        ))
        .bind(session_id)
        .bind(intent_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(participant)
    }

    /// Opens a unit of work on one split, holding the database write lock.
    ///
    /// ## Errors
    /// [`DbError::NotFound`] when no split has this id. Nothing is written.
    pub async fn lock(&self, split_id: &str) -> DbResult<SplitTx> {
        let mut tx = self.pool.begin().await?;

        let touched = sqlx::query("UPDATE splits SET updated_at = ?1 WHERE id = ?2")
            .bind(super::now())
            .bind(split_id)
            .execute(&mut *tx)
            .await?;

        if touched.rows_affected() == 0 {
            return Err(DbError::not_found("Split", split_id));
        }

        debug!(split_id = %split_id, "Split locked");

        Ok(SplitTx {
            tx,
            split_id: split_id.to_string(),
        })
    }
}

// =============================================================================
// Locked Unit of Work
// =============================================================================

/// A transaction scoped to one split.
///
/// Holds SQLite's write lock from [`SplitRepository::lock`] until
/// [`SplitTx::commit`] or drop. While it is alive, do not use the pool for
/// other queries from the same task: with a one-connection pool that waits
/// forever on itself.
pub struct SplitTx {
    tx: Transaction<'static, Sqlite>,
    split_id: String,
}

impl SplitTx {
    /// The locked split's id.
    pub fn split_id(&self) -> &str {
        &self.split_id
    }

    /// Reads the locked split.
    pub async fn split(&mut self) -> DbResult<Split> {
        let split = sqlx::query_as::<_, Split>(split_select!("WHERE id = ?1"))
            .bind(&self.split_id)
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(split)
    }

    /// Reads the split's participants, in insertion order.
    pub async fn participants(&mut self) -> DbResult<Vec<Participant>> {
        let participants = sqlx::query_as::<_, Participant>(participant_select!(
            "WHERE split_id = ?1 ORDER BY position, created_at"
        ))
        .bind(&self.split_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(participants)
    }

    /// Reads one participant of the locked split.
    pub async fn participant(&mut self, participant_id: &str) -> DbResult<Option<Participant>> {
        let participant = sqlx::query_as::<_, Participant>(participant_select!(
            "WHERE id = ?1 AND split_id = ?2"
        ))
        .bind(participant_id)
        .bind(&self.split_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(participant)
    }

    /// Overwrites one participant's share.
    pub async fn set_share(
        &mut self,
        participant_id: &str,
        amount: Money,
        custom_amount: bool,
    ) -> DbResult<()> {
        sqlx::query(
            "UPDATE split_participants SET amount_cents = ?1, custom_amount = ?2 WHERE id = ?3 AND split_id = ?4",
        )
        .bind(amount.cents())
        .bind(custom_amount)
        .bind(participant_id)
        .bind(&self.split_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    /// Appends a participant after the existing ones.
    pub async fn add_participant(&mut self, participant: &NewParticipant) -> DbResult<Participant> {
        let position: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position), -1) + 1 FROM split_participants WHERE split_id = ?1",
        )
        .bind(&self.split_id)
        .fetch_one(&mut *self.tx)
        .await?;

        insert_participant(&mut self.tx, &self.split_id, participant, position, super::now()).await
    }

    /// Sets a participant's status and, when given, links a user.
    ///
    /// An already linked user is kept when `user_id` is `None`.
    pub async fn update_participant(
        &mut self,
        participant_id: &str,
        status: ParticipantStatus,
        user_id: Option<&str>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE split_participants
            SET status = ?1, user_id = COALESCE(?2, user_id)
            WHERE id = ?3 AND split_id = ?4
            "#,
        )
        .bind(status)
        .bind(user_id)
        .bind(participant_id)
        .bind(&self.split_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    /// Records the checkout session created for a participant.
    pub async fn set_payment_session(&mut self, participant_id: &str, session_id: &str) -> DbResult<()> {
        sqlx::query(
            "UPDATE split_participants SET payment_session_id = ?1 WHERE id = ?2 AND split_id = ?3",
        )
        .bind(session_id)
        .bind(participant_id)
        .bind(&self.split_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    /// Marks a participant PAID.
    ///
    /// Provider ids are stored when present; missing ones keep their
    /// stored value.
    pub async fn mark_paid(
        &mut self,
        participant_id: &str,
        session_id: Option<&str>,
        intent_id: Option<&str>,
        paid_at: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE split_participants
            SET status = ?1,
                paid_at = ?2,
                payment_session_id = COALESCE(?3, payment_session_id),
                payment_intent_id = COALESCE(?4, payment_intent_id)
            WHERE id = ?5 AND split_id = ?6
            "#,
        )
        .bind(ParticipantStatus::Paid)
        .bind(paid_at)
        .bind(session_id)
        .bind(intent_id)
        .bind(participant_id)
        .bind(&self.split_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    /// Re-derives the split status from the participants as they are now,
    /// inside this transaction, and stores it.
    pub async fn refresh_status(&mut self) -> DbResult<SplitStatus> {
        let statuses: Vec<ParticipantStatus> =
            sqlx::query_scalar("SELECT status FROM split_participants WHERE split_id = ?1")
                .bind(&self.split_id)
                .fetch_all(&mut *self.tx)
                .await?;

        let status = derive_split_status(statuses);

        sqlx::query("UPDATE splits SET status = ?1 WHERE id = ?2")
            .bind(status)
            .bind(&self.split_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(status)
    }

    /// Commits every write made through this handle.
    pub async fn commit(self) -> DbResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!(split_id = %self.split_id, "Split transaction committed");
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn insert_participant(
    tx: &mut Transaction<'static, Sqlite>,
    split_id: &str,
    participant: &NewParticipant,
    position: i64,
    now: DateTime<Utc>,
) -> DbResult<Participant> {
    let record = Participant {
        id: Uuid::new_v4().to_string(),
        split_id: split_id.to_string(),
        name: participant.name.clone(),
        phone: participant.phone.clone(),
        amount_cents: participant.amount.cents(),
        custom_amount: participant.custom_amount,
        status: participant.status,
        user_id: participant.user_id.clone(),
        payment_session_id: None,
        payment_intent_id: None,
        paid_at: None,
        created_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO split_participants (
            id, split_id, name, phone, amount_cents, custom_amount,
            status, user_id, created_at, position
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&record.id)
    .bind(&record.split_id)
    .bind(&record.name)
    .bind(&record.phone)
    .bind(record.amount_cents)
    .bind(record.custom_amount)
    .bind(record.status)
    .bind(&record.user_id)
    .bind(record.created_at)
    .bind(position)
    .execute(&mut **tx)
    .await?;

    Ok(record)
}

/// Characters that survive being read aloud or copied by hand: no 0/o,
/// 1/l/i.
const SHARE_CODE_ALPHABET: &[u8] = b"23456789abcdefghjkmnpqrstuvwxyz";

/// Length of a public share code.
pub const SHARE_CODE_LENGTH: usize = 10;

/// Generates a share code from the random bytes of a UUID v4.
///
/// ## Format
/// 10 characters from [`SHARE_CODE_ALPHABET`], e.g. `k3x9q2m7ab`.
/// Always a valid identifier for the API's path validation.
pub fn generate_share_code() -> String {
    Uuid::new_v4()
        .as_bytes()
        .iter()
        .take(SHARE_CODE_LENGTH)
        .map(|b| SHARE_CODE_ALPHABET[(*b as usize) % SHARE_CODE_ALPHABET.len()] as char)
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
