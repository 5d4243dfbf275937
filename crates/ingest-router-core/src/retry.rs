//! Retry policy.
//!
//! A chain is retried only for transient failures, only while its attempt
//! count is below `max_attempts`, and only while the event is younger than
//! `max_event_age`. The delay between attempts is fixed.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use ingest_router_model::{BackendKind, DeadLetterCause, DispatchError};

use crate::config::{RetryOverride, RetryOverrides, RouterConfig};
use crate::error::{RouterError, RouterResult};

/// Retry bounds for one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts allowed per chain, including the first.
    pub max_attempts: u32,
    /// Age after which an event is no longer dispatched.
    pub max_event_age: Duration,
    /// Delay before each retry.
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            max_event_age: Duration::from_secs(6 * 60 * 60),
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait `delay`, then run attempt `next_attempt`.
    Retry {
        /// Attempt number of the retry.
        next_attempt: u32,
        /// Delay before the retry.
        delay: Duration,
    },
    /// Stop and dead-letter the chain.
    GiveUp(DeadLetterCause),
}

impl RetryPolicy {
    /// Check the bounds are usable.
    pub fn validate(&self, scope: &str) -> RouterResult<()> {
        if self.max_attempts == 0 {
            return Err(RouterError::InvalidPolicy {
                scope: scope.to_owned(),
                reason: "maxAttempts must be at least 1".to_owned(),
            });
        }
        if self.max_event_age.is_zero() {
            return Err(RouterError::InvalidPolicy {
                scope: scope.to_owned(),
                reason: "maxEventAge must be positive".to_owned(),
            });
        }
        Ok(())
    }

    /// Apply an override on top of this policy.
    #[must_use]
    pub fn with_override(mut self, over: &RetryOverride) -> Self {
        if let Some(n) = over.max_attempts {
            self.max_attempts = n;
        }
        if let Some(secs) = over.max_event_age_secs {
            self.max_event_age = Duration::from_secs(secs);
        }
        if let Some(ms) = over.retry_delay_ms {
            self.retry_delay = Duration::from_millis(ms);
        }
        self
    }

    /// Whether an event created at `created_at` is too old to dispatch at `now`.
    ///
    /// Events stamped in the future have age zero.
    #[must_use]
    pub fn is_expired(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let age = (now - created_at).to_std().unwrap_or(Duration::ZERO);
        age >= self.max_event_age
    }

    /// Decide the chain's next step after attempt `attempt_number` failed.
    #[must_use]
    pub fn after_failure(
        &self,
        error: &DispatchError,
        attempt_number: u32,
        created_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> RetryDecision {
        match error {
            DispatchError::MalformedEvent(_) => RetryDecision::GiveUp(DeadLetterCause::MalformedEvent),
            err if err.is_permanent() => RetryDecision::GiveUp(DeadLetterCause::Rejected),
            _ if attempt_number >= self.max_attempts => {
                RetryDecision::GiveUp(DeadLetterCause::RetryExhausted)
            }
            _ if self.is_expired(created_at, now) => RetryDecision::GiveUp(DeadLetterCause::EventExpired),
            _ => RetryDecision::Retry {
                next_attempt: attempt_number + 1,
                delay: self.retry_delay,
            },
        }
    }
}

/// Default policy plus per-backend-kind overrides.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicies {
    default: RetryPolicy,
    overrides: HashMap<BackendKind, RetryPolicy>,
}

impl RetryPolicies {
    /// Policies using `default` for every backend kind.
    #[must_use]
    pub fn uniform(default: RetryPolicy) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    /// Build from process defaults and the rules file overrides.
    pub fn from_config(config: &RouterConfig, overrides: &RetryOverrides) -> RouterResult<Self> {
        let default = RetryPolicy {
            max_attempts: config.max_attempts,
            max_event_age: Duration::from_secs(config.max_event_age_secs),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        };
        let mut policies = Self::uniform(default);
        for kind in BackendKind::ALL {
            if let Some(over) = overrides.get(kind) {
                policies = policies.with_kind(kind, default.with_override(over));
            }
        }
        policies.validate()?;
        Ok(policies)
    }

    /// Set the policy for one backend kind.
    #[must_use]
    pub fn with_kind(mut self, kind: BackendKind, policy: RetryPolicy) -> Self {
        self.overrides.insert(kind, policy);
        self
    }

    /// Policy applying to rules of `kind`.
    #[must_use]
    pub fn for_kind(&self, kind: BackendKind) -> &RetryPolicy {
        self.overrides.get(&kind).unwrap_or(&self.default)
    }

    /// Validate every policy.
    pub fn validate(&self) -> RouterResult<()> {
        self.default.validate("default")?;
        for (kind, policy) in &self.overrides {
            policy.validate(kind.as_str())?;
        }
        Ok(())
    }
}
