//! Swap negotiation: creating, listing, and resolving swap requests.
//!
//! A request moves `pending -> completed` (accept) or `pending -> rejected`;
//! both end states are terminal.  Acceptance re-validates ownership at the
//! moment of acceptance inside the store's transaction, so two competing
//! requests over the same book resolve first-accept-wins: the later accept
//! observes drifted ownership and fails without touching any row.  The
//! loser's request stays `pending` until its recipient rejects it.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use bookswap_store::{
    Database, Notification, StoreError, SwapOverview, SwapRequest, SwapStatus,
};

use crate::error::ApiError;

#[derive(Debug, Error)]
pub enum SwapError {
    #[error("offeredBook, requestedBook and toUser are required")]
    MissingField,

    #[error("One or both books not found")]
    BookNotFound,

    #[error("Swap request not found")]
    NotFound,

    #[error("You do not own the offered book")]
    NotOwner,

    #[error("Requested book is not owned by the target user")]
    OwnerMismatch,

    #[error("You cannot create a swap with yourself")]
    SelfSwap,

    #[error("A pending swap request already exists for these books")]
    DuplicatePending,

    #[error("Cannot act on a {0} request")]
    InvalidState(SwapStatus),

    #[error("Only the recipient can respond to this swap")]
    Forbidden,

    #[error("Ownership changed since the request was created. Please retry.")]
    ConflictRetry,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<SwapError> for ApiError {
    fn from(e: SwapError) -> Self {
        match e {
            SwapError::MissingField
            | SwapError::OwnerMismatch
            | SwapError::SelfSwap
            | SwapError::InvalidState(_) => ApiError::BadRequest(e.to_string()),
            SwapError::BookNotFound | SwapError::NotFound => ApiError::NotFound(e.to_string()),
            SwapError::NotOwner | SwapError::Forbidden => ApiError::Forbidden(e.to_string()),
            SwapError::DuplicatePending | SwapError::ConflictRetry => {
                ApiError::Conflict(e.to_string())
            }
            SwapError::Store(inner) => inner.into(),
        }
    }
}

/// Creates, lists, and resolves swap requests.
///
/// Every operation takes the database mutex once and holds it across its
/// whole read-check-write sequence, so operations on the same request or the
/// same book are serialized against each other.
#[derive(Clone)]
pub struct SwapEngine {
    db: Arc<Mutex<Database>>,
}

impl SwapEngine {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    /// Create a new pending request after the full guard chain: both books
    /// exist, the caller owns the offered one, the declared recipient owns
    /// the requested one, the caller is not the recipient, and no identical
    /// pending request exists.
    pub async fn create(
        &self,
        from_user: Uuid,
        offered_book: Option<Uuid>,
        requested_book: Option<Uuid>,
        to_user: Option<Uuid>,
    ) -> Result<SwapRequest, SwapError> {
        let (Some(offered_id), Some(requested_id), Some(to_user)) =
            (offered_book, requested_book, to_user)
        else {
            return Err(SwapError::MissingField);
        };

        let db = self.db.lock().await;

        let offered = db.get_book(offered_id).map_err(book_not_found)?;
        let requested = db.get_book(requested_id).map_err(book_not_found)?;

        if offered.owner_id != from_user {
            return Err(SwapError::NotOwner);
        }
        if requested.owner_id != to_user {
            return Err(SwapError::OwnerMismatch);
        }
        if from_user == to_user {
            return Err(SwapError::SelfSwap);
        }
        if db
            .find_pending_swap(from_user, to_user, offered_id, requested_id)?
            .is_some()
        {
            return Err(SwapError::DuplicatePending);
        }

        let swap = SwapRequest {
            id: Uuid::new_v4(),
            from_user,
            to_user,
            offered_book: offered_id,
            requested_book: requested_id,
            status: SwapStatus::Pending,
            created_at: Utc::now(),
        };
        db.create_swap(&swap)?;

        info!(swap = %swap.id, from = %from_user, to = %to_user, "swap request created");
        Ok(swap)
    }

    /// Requests addressed to `user`, newest first.
    pub async fn list_incoming(&self, user: Uuid) -> Result<Vec<SwapOverview>, SwapError> {
        Ok(self.db.lock().await.list_incoming_swaps(user)?)
    }

    /// Requests initiated by `user`, newest first.
    pub async fn list_outgoing(&self, user: Uuid) -> Result<Vec<SwapOverview>, SwapError> {
        Ok(self.db.lock().await.list_outgoing_swaps(user)?)
    }

    /// Accept a pending request as its recipient and perform the ownership
    /// exchange.
    ///
    /// The exchange itself runs inside a store transaction that re-validates
    /// both owners; a competing swap that completed first surfaces as
    /// [`SwapError::ConflictRetry`] with nothing written.  Notifying the two
    /// parties happens after the commit and is fire-and-forget: a failure
    /// there is logged but cannot undo the completed swap.
    pub async fn accept(
        &self,
        swap_id: Uuid,
        acting_user: Uuid,
    ) -> Result<SwapRequest, SwapError> {
        let mut db = self.db.lock().await;

        let swap = db.get_swap(swap_id).map_err(swap_not_found)?;
        if swap.status != SwapStatus::Pending {
            return Err(SwapError::InvalidState(swap.status));
        }
        if swap.to_user != acting_user {
            return Err(SwapError::Forbidden);
        }

        match db.complete_swap(&swap) {
            Ok(()) => {}
            Err(StoreError::OwnershipDrift) => return Err(SwapError::ConflictRetry),
            Err(StoreError::NotFound) => return Err(SwapError::BookNotFound),
            Err(other) => return Err(other.into()),
        }

        info!(swap = %swap.id, "swap completed, ownership exchanged");

        if let Err(e) = notify_parties(&db, &swap) {
            warn!(swap = %swap.id, error = %e, "notification step failed");
        }

        Ok(SwapRequest {
            status: SwapStatus::Completed,
            ..swap
        })
    }

    /// Reject a pending request as its recipient.  No ownership changes.
    pub async fn reject(
        &self,
        swap_id: Uuid,
        acting_user: Uuid,
    ) -> Result<SwapRequest, SwapError> {
        let db = self.db.lock().await;

        let swap = db.get_swap(swap_id).map_err(swap_not_found)?;
        if swap.status != SwapStatus::Pending {
            return Err(SwapError::InvalidState(swap.status));
        }
        if swap.to_user != acting_user {
            return Err(SwapError::Forbidden);
        }

        db.set_swap_status(swap.id, SwapStatus::Rejected)?;

        info!(swap = %swap.id, "swap rejected");
        Ok(SwapRequest {
            status: SwapStatus::Rejected,
            ..swap
        })
    }
}

/// Record one confirmation notification per party, naming the counterpart
/// and a contact address.
fn notify_parties(db: &Database, swap: &SwapRequest) -> Result<(), StoreError> {
    let from = db.get_user(swap.from_user)?;
    let to = db.get_user(swap.to_user)?;
    let now = Utc::now();

    db.create_notification(&Notification {
        id: Uuid::new_v4(),
        user_id: from.id,
        message: format!(
            "Your swap with {} is confirmed! Contact: {}",
            to.name, to.email
        ),
        created_at: now,
    })?;
    db.create_notification(&Notification {
        id: Uuid::new_v4(),
        user_id: to.id,
        message: format!(
            "Your swap with {} is confirmed! Contact: {}",
            from.name, from.email
        ),
        created_at: now,
    })?;
    Ok(())
}

fn book_not_found(e: StoreError) -> SwapError {
    match e {
        StoreError::NotFound => SwapError::BookNotFound,
        other => SwapError::Store(other),
    }
}

fn swap_not_found(e: StoreError) -> SwapError {
    match e {
        StoreError::NotFound => SwapError::NotFound,
        other => SwapError::Store(other),
    }
}
