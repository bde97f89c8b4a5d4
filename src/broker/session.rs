//! Reference-counted broker session shared by concurrent callers.
//!
//! The first [`SessionManager::acquire`] signs in; later acquires reuse the
//! cached session and bump the reference count. [`SessionManager::release`]
//! signs out only when the count drops from 1 to 0.
//!
//! # Locking
//!
//! Sign-in and sign-out each run under their own async mutex, so an in-flight
//! sign-out never blocks a new acquire and vice versa. The `(ref_count, session)`
//! pair sits behind a plain mutex that is only held for bookkeeping, never
//! across a remote call. Every guard is scoped, so no exit path leaves a lock
//! held.
//!
//! A release that tears the session down detaches it from the manager before
//! signing out. An acquire arriving during that sign-out finds no session and
//! signs in again instead of receiving one that is about to be invalidated.
//!
//! # Cancellation
//!
//! The remote sign-in and sign-out run on spawned tasks. An `acquire` dropped
//! while the broker is still answering leaves no session behind: the task signs
//! the orphan back out. A dropped `release` has already detached the session,
//! and its sign-out still completes.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tracing::{debug, error, info, warn};

use super::error::{BrokerError, Result};
use super::transport::BrokerTransport;
use super::types::Session;

/// Shared bookkeeping. `ref_count > 0` iff `session.is_some()`.
#[derive(Default)]
struct SessionState {
    ref_count: usize,
    session: Option<Arc<Session>>,
}

/// Owns the lazily created, reference-counted broker session.
///
/// Create one per broker and hand it (behind an `Arc`) to every caller that
/// needs credentials. Each successful [`acquire`](Self::acquire) must be paired
/// with exactly one [`release`](Self::release).
///
/// # Example
///
/// ```rust,ignore
/// let sessions = Arc::new(SessionManager::new(Arc::new(HttpTransport::new(&config)?)));
///
/// let session = sessions.acquire().await?;
/// // ... use the session ...
/// sessions.release().await?;
/// ```
pub struct SessionManager {
    transport: Arc<dyn BrokerTransport>,
    sign_in_lock: AsyncMutex<()>,
    sign_out_lock: AsyncMutex<()>,
    state: Mutex<SessionState>,
}

impl SessionManager {
    pub fn new(transport: Arc<dyn BrokerTransport>) -> Self {
        Self {
            transport,
            sign_in_lock: AsyncMutex::new(()),
            sign_out_lock: AsyncMutex::new(()),
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Transport the session was built on. Lease code issues its calls through it.
    pub fn transport(&self) -> Arc<dyn BrokerTransport> {
        Arc::clone(&self.transport)
    }

    /// Get the shared session, signing in if none exists.
    ///
    /// Concurrent callers are serialized on the sign-in lock, so a burst of
    /// acquires against an idle manager produces exactly one sign-in and every
    /// caller receives the same session.
    ///
    /// # Errors
    ///
    /// Returns the sign-in error. A failed acquire leaves the reference count
    /// untouched.
    pub async fn acquire(&self) -> Result<Arc<Session>> {
        let _sign_in = self.sign_in_lock.lock().await;

        {
            let mut state = self.lock_state();
            if let Some(session) = state.session.clone() {
                state.ref_count += 1;
                debug!(ref_count = state.ref_count, "Reusing broker session");
                return Ok(session);
            }
        }

        let session = match self.sign_in().await {
            Ok(session) => Arc::new(session),
            Err(e) => {
                error!(error = %e, "Broker sign-in failed");
                return Err(e);
            }
        };

        let mut state = self.lock_state();
        state.session = Some(Arc::clone(&session));
        state.ref_count += 1;
        info!(
            user_id = session.user().user_id,
            user_name = %session.user().user_name,
            ref_count = state.ref_count,
            "Signed in to broker"
        );

        Ok(session)
    }

    /// Drop one reference, signing out when it was the last one.
    ///
    /// # Errors
    ///
    /// - [`BrokerError::NotAcquired`] if no reference is outstanding
    /// - [`BrokerError::SignOutFailed`] if the physical sign-out failed; the
    ///   count is already 0 and the session discarded when this is returned
    pub async fn release(&self) -> Result<()> {
        let _sign_out = self.sign_out_lock.lock().await;

        let session = {
            let mut state = self.lock_state();
            match state.ref_count {
                0 => {
                    warn!("Release called without a matching acquire");
                    return Err(BrokerError::NotAcquired);
                }
                1 => {
                    state.ref_count = 0;
                    state.session.take()
                }
                _ => {
                    state.ref_count -= 1;
                    debug!(ref_count = state.ref_count, "Released broker session reference");
                    return Ok(());
                }
            }
        };

        let Some(session) = session else {
            return Ok(());
        };

        let user_name = session.user().user_name.clone();
        let transport = Arc::clone(&self.transport);
        let signed_out = tokio::spawn(async move { transport.sign_out(&session).await }).await?;

        if let Err(e) = signed_out {
            warn!(error = %e, user_name = %user_name, "Broker sign-out failed");
            return Err(BrokerError::sign_out_failed(e));
        }

        info!(user_name = %user_name, "Signed out of broker");
        Ok(())
    }

    /// Sign in on a spawned task, signing the session back out if nobody is
    /// left to receive it.
    async fn sign_in(&self) -> Result<Session> {
        let (tx, rx) = oneshot::channel();
        let transport = Arc::clone(&self.transport);

        tokio::spawn(async move {
            let result = transport.sign_in().await;
            if let Err(Ok(orphan)) = tx.send(result) {
                warn!(
                    user_name = %orphan.user().user_name,
                    "Acquire cancelled during sign-in; signing the session out"
                );
                if let Err(e) = transport.sign_out(&orphan).await {
                    warn!(error = %e, "Sign-out of orphaned session failed");
                }
            }
        });

        rx.await.map_err(|_| BrokerError::task("sign-in task ended without a result"))?
    }

    /// Number of outstanding acquires.
    pub fn ref_count(&self) -> usize {
        self.lock_state().ref_count
    }

    /// Whether a live session is cached.
    pub fn is_signed_in(&self) -> bool {
        self.lock_state().session.is_some()
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        // the state is two plain fields, so a panic elsewhere cannot leave it half-written
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock_state();
        f.debug_struct("SessionManager")
            .field("ref_count", &state.ref_count)
            .field("signed_in", &state.session.is_some())
            .finish()
    }
}
