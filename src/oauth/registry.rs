//! Usage: Concurrency-safe store of in-flight authorization attempts keyed by the state token.
//!
//! Every mutation is a single check-and-set under one lock, so a redirect and a
//! timeout racing on the same token see exactly one winner and one no-op.

use crate::shared::mutex_ext::MutexExt;
use crate::shared::security::mask_token;
use crate::shared::time::now_unix_seconds;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

const STATE_TOKEN_BYTES: usize = 32;
/// Abandoned entries are swept this long after their deadline, leaving the
/// owning task ample room to claim its own result first.
const SWEEP_GRACE_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRequestStatus {
    Pending,
    Delivered,
    Completed,
    Expired,
    Failed,
}

impl AuthRequestStatus {
    fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Expired | Self::Failed)
    }
}

#[derive(Debug)]
enum AuthRequestResult {
    Code(String),
    ProviderError(String),
}

#[derive(Debug)]
struct PendingAuthRequest {
    owner: i64,
    status: AuthRequestStatus,
    created_at: i64,
    deadline: i64,
    result: Option<AuthRequestResult>,
    notify: Option<oneshot::Sender<()>>,
}

impl PendingAuthRequest {
    fn fire_notify(&mut self) {
        if let Some(tx) = self.notify.take() {
            let _ = tx.send(());
        }
    }
}

/// Result of handing an inbound redirect to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    Resolved,
    NotFound,
    AlreadyResolved,
}

/// What the owning attempt observes once the completion signal fired or the
/// timeout elapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AwaitedRedirect {
    Code(String),
    ProviderError(String),
    TimedOut,
}

pub struct PendingAuthRegistry {
    attempt_timeout: Duration,
    requests: Mutex<HashMap<String, PendingAuthRequest>>,
}

pub(crate) fn generate_state_token() -> String {
    use rand::rngs::OsRng;
    let mut bytes = [0u8; STATE_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

impl PendingAuthRegistry {
    pub fn new(attempt_timeout: Duration) -> Self {
        Self {
            attempt_timeout,
            requests: Mutex::new(HashMap::new()),
        }
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Register a new pending attempt for `owner`. Returns the fresh state
    /// token and the one-shot completion signal the owner can await.
    pub fn create(&self, owner: i64) -> (String, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        let now = now_unix_seconds();
        let deadline = now + self.attempt_timeout.as_secs() as i64;

        let mut guard = self.requests.lock_or_recover();
        let mut token = generate_state_token();
        // A collision with a live token is astronomically unlikely at 256 bits
        // of entropy, but a duplicate key would hand one attempt's redirect to
        // another owner, so regenerate rather than overwrite.
        while guard.contains_key(&token) {
            token = generate_state_token();
        }

        guard.insert(
            token.clone(),
            PendingAuthRequest {
                owner,
                status: AuthRequestStatus::Pending,
                created_at: now,
                deadline,
                result: None,
                notify: Some(tx),
            },
        );
        tracing::debug!(owner, token = %mask_token(&token), "authorization attempt registered");

        (token, rx)
    }

    /// Deliver an authorization code for `token`. Only the first delivery (or
    /// the first competing `fail`/`expire`) wins; everything later is a no-op.
    pub fn resolve(&self, token: &str, code: &str) -> ResolveOutcome {
        let mut guard = self.requests.lock_or_recover();
        let Some(request) = guard.get_mut(token) else {
            return ResolveOutcome::NotFound;
        };
        if request.status != AuthRequestStatus::Pending {
            return ResolveOutcome::AlreadyResolved;
        }

        request.status = AuthRequestStatus::Delivered;
        request.result = Some(AuthRequestResult::Code(code.to_string()));
        request.fire_notify();
        tracing::debug!(owner = request.owner, token = %mask_token(token), "authorization code delivered");
        ResolveOutcome::Resolved
    }

    /// Record a provider-reported failure. Allowed out of `Pending` and out of
    /// `Delivered` (a late error redirect overriding an unclaimed code); no-op
    /// once terminal.
    pub fn fail(&self, token: &str, reason: &str) -> ResolveOutcome {
        let mut guard = self.requests.lock_or_recover();
        let Some(request) = guard.get_mut(token) else {
            return ResolveOutcome::NotFound;
        };
        if request.status.is_terminal() {
            return ResolveOutcome::AlreadyResolved;
        }

        request.status = AuthRequestStatus::Failed;
        request.result = Some(AuthRequestResult::ProviderError(reason.to_string()));
        request.fire_notify();
        tracing::debug!(owner = request.owner, token = %mask_token(token), reason, "authorization attempt failed");
        ResolveOutcome::Resolved
    }

    /// Timeout path: expire the attempt, but only while it is still `Pending`.
    /// A request that already received its redirect is never expired, even if
    /// the exchange afterwards is slow. Returns whether the transition happened.
    pub fn expire(&self, token: &str) -> bool {
        let mut guard = self.requests.lock_or_recover();
        let Some(request) = guard.get_mut(token) else {
            return false;
        };
        if request.status != AuthRequestStatus::Pending {
            return false;
        }

        request.status = AuthRequestStatus::Expired;
        request.fire_notify();
        tracing::debug!(owner = request.owner, token = %mask_token(token), "authorization attempt expired");
        true
    }

    /// Consume the attempt's outcome and drop the entry. Called exactly once by
    /// the owning task after the completion signal fired or its timeout elapsed.
    pub fn claim(&self, token: &str) -> Option<AwaitedRedirect> {
        let mut guard = self.requests.lock_or_recover();
        let status = guard.get(token).map(|request| request.status)?;
        if status == AuthRequestStatus::Pending {
            // The owner claims only after a signal or after expiring the entry,
            // so a still-pending entry belongs to someone else. Leave it alone.
            return None;
        }

        let request = guard.remove(token)?;
        match (request.status, request.result) {
            (AuthRequestStatus::Delivered, Some(AuthRequestResult::Code(code))) => {
                Some(AwaitedRedirect::Code(code))
            }
            (AuthRequestStatus::Failed, Some(AuthRequestResult::ProviderError(reason))) => {
                Some(AwaitedRedirect::ProviderError(reason))
            }
            (AuthRequestStatus::Expired, _) => Some(AwaitedRedirect::TimedOut),
            (status, _) => {
                tracing::warn!(
                    owner = request.owner,
                    token = %mask_token(token),
                    ?status,
                    "claimed attempt in unexpected state"
                );
                Some(AwaitedRedirect::TimedOut)
            }
        }
    }

    /// Drop entries whose owner never claimed them (crashed or cancelled task).
    /// Returns how many entries were removed.
    pub fn sweep(&self, now_unix: i64) -> usize {
        let mut guard = self.requests.lock_or_recover();
        let before = guard.len();
        guard.retain(|token, request| {
            let keep = now_unix <= request.deadline + SWEEP_GRACE_SECS;
            if !keep {
                tracing::warn!(
                    owner = request.owner,
                    token = %mask_token(token),
                    status = ?request.status,
                    "sweeping abandoned authorization attempt"
                );
            }
            keep
        });
        before - guard.len()
    }

    /// Periodic sweep task; abort the handle on shutdown.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = registry.sweep(now_unix_seconds());
                if removed > 0 {
                    tracing::info!(removed, "registry sweep removed abandoned attempts");
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.requests.lock_or_recover().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, token: &str) -> bool {
        self.requests.lock_or_recover().contains_key(token)
    }

    #[cfg(test)]
    fn status_of(&self, token: &str) -> Option<AuthRequestStatus> {
        self.requests
            .lock_or_recover()
            .get(token)
            .map(|request| request.status)
    }
}
