//! Usage: Drives one user's authorization attempt end to end (begin, await, exchange, persist).

use crate::domain::credentials::HhCredential;
use crate::infra::db::Db;
use crate::oauth::provider::HhOAuthConfig;
use crate::oauth::registry::{AwaitedRedirect, PendingAuthRegistry};
use crate::oauth::token_exchange;
use crate::shared::blocking;
use crate::shared::error::AppResult;
use crate::shared::security::mask_token;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// One in-flight attempt as handed to the caller: the authorize URL to present
/// to the user plus the completion signal to await.
pub struct StartedAttempt {
    pub token: String,
    pub authorize_url: String,
    signal: oneshot::Receiver<()>,
}

/// Terminal outcome of one attempt, each mapped to a distinct user message.
#[derive(Debug)]
pub enum AuthFlowOutcome {
    Succeeded(HhCredential),
    ProviderDenied(String),
    TimedOut,
    ExchangeFailed(String),
}

pub struct AuthCoordinator {
    registry: Arc<PendingAuthRegistry>,
    provider: HhOAuthConfig,
    http: reqwest::Client,
    db: Db,
}

impl AuthCoordinator {
    pub fn new(
        registry: Arc<PendingAuthRegistry>,
        provider: HhOAuthConfig,
        db: Db,
    ) -> AppResult<Self> {
        // Catch a malformed authorize URL at startup instead of per attempt.
        provider.build_authorize_url("startup-probe")?;

        let http = reqwest::Client::builder()
            .user_agent(format!(
                "hh-vacancy-bot-oauth/{}",
                env!("CARGO_PKG_VERSION")
            ))
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| format!("SYSTEM_ERROR: oauth http client init failed: {e}"))?;

        Ok(Self {
            registry,
            provider,
            http,
            db,
        })
    }

    pub fn registry(&self) -> &Arc<PendingAuthRegistry> {
        &self.registry
    }

    /// Register a fresh attempt for `owner` and build its authorize URL.
    pub fn begin(&self, owner: i64) -> AppResult<StartedAttempt> {
        let (token, signal) = self.registry.create(owner);
        let authorize_url = match self.provider.build_authorize_url(&token) {
            Ok(url) => url,
            Err(err) => {
                // Release the just-created entry before surfacing the error.
                self.registry.expire(&token);
                self.registry.claim(&token);
                return Err(err);
            }
        };

        tracing::info!(owner, token = %mask_token(&token), "authorization attempt started");
        Ok(StartedAttempt {
            token,
            authorize_url,
            signal,
        })
    }

    /// Suspend until the attempt's completion signal fires or the registry's
    /// configured timeout elapses, then consume the terminal result.
    pub async fn await_completion(&self, attempt: StartedAttempt) -> AwaitedRedirect {
        self.await_completion_for(attempt, self.registry.attempt_timeout())
            .await
    }

    pub async fn await_completion_for(
        &self,
        attempt: StartedAttempt,
        timeout: Duration,
    ) -> AwaitedRedirect {
        let StartedAttempt { token, signal, .. } = attempt;

        match tokio::time::timeout(timeout, signal).await {
            // Signal fired (or its sender vanished with a swept entry).
            Ok(_) => {}
            // Timeout: try to expire. Whoever wins the atomic transition
            // decides the outcome; the claim below reads the winner's result.
            Err(_elapsed) => {
                self.registry.expire(&token);
            }
        }

        match self.registry.claim(&token) {
            Some(outcome) => outcome,
            None => {
                tracing::warn!(token = %mask_token(&token), "attempt vanished before it could be claimed");
                AwaitedRedirect::TimedOut
            }
        }
    }

    /// Turn the awaited redirect into a terminal flow outcome, exchanging the
    /// code and persisting the credential on success. Authorization codes are
    /// single-use: an exchange failure requires a fresh `begin`, never a retry.
    pub async fn complete(&self, owner: i64, redirect: AwaitedRedirect) -> AppResult<AuthFlowOutcome> {
        match redirect {
            AwaitedRedirect::TimedOut => {
                tracing::info!(owner, "authorization attempt timed out");
                Ok(AuthFlowOutcome::TimedOut)
            }
            AwaitedRedirect::ProviderError(reason) => {
                tracing::info!(owner, reason, "authorization denied by provider");
                Ok(AuthFlowOutcome::ProviderDenied(reason))
            }
            AwaitedRedirect::Code(code) => {
                tracing::debug!(owner, "exchanging authorization code");
                match token_exchange::exchange_authorization_code(&self.http, &self.provider, &code)
                    .await
                {
                    Ok(credential) => {
                        let db = self.db.clone();
                        let stored = credential.clone();
                        blocking::run("auth_save_credential", move || {
                            let conn = db.open_connection()?;
                            crate::domain::credentials::put(&conn, owner, &stored)
                        })
                        .await?;
                        tracing::info!(owner, "authorization completed, credential stored");
                        Ok(AuthFlowOutcome::Succeeded(credential))
                    }
                    Err(err) => {
                        tracing::warn!(owner, "token exchange failed: {err}");
                        Ok(AuthFlowOutcome::ExchangeFailed(err.to_string()))
                    }
                }
            }
        }
    }
}
