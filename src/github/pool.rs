//! Credential pool with round-robin rotation and per-credential cooldowns

use crate::core::sync::handle_mutex_poison;
use crate::core::time::{Clock, SystemClock};
use crate::github::error::{GithubError, GithubResult};
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::{Arc, Mutex};

pub const DEFAULT_MIN_COOLDOWN_SECS: i64 = 60;

/// An opaque bearer token
///
/// `Debug` and `Display` only ever show the first four characters.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for the Authorization header only
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn masked(&self) -> String {
        let prefix: String = self.0.chars().take(4).collect();
        format!("{}...", prefix)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.masked())
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

#[derive(Debug)]
struct Slot {
    credential: Credential,
    cooldown_until: Option<DateTime<Utc>>,
    disabled: bool,
}

impl Slot {
    fn usable_at(&self, now: DateTime<Utc>) -> bool {
        !self.disabled && self.cooldown_until.map_or(true, |until| until <= now)
    }
}

#[derive(Debug)]
struct PoolState {
    slots: Vec<Slot>,
    cursor: usize,
}

/// Process-wide set of API credentials
pub struct CredentialPool {
    state: Mutex<PoolState>,
    clock: Arc<dyn Clock>,
    min_cooldown: Duration,
}

impl CredentialPool {
    /// Build a pool from raw tokens
    ///
    /// Tokens are trimmed; blanks and duplicates are dropped. An empty result
    /// is `GithubError::NoCredentials`.
    pub fn new<I, S>(tokens: I) -> GithubResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_clock(tokens, Arc::new(SystemClock))
    }

    pub fn with_clock<I, S>(tokens: I, clock: Arc<dyn Clock>) -> GithubResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut slots: Vec<Slot> = Vec::new();
        for token in tokens {
            let token = token.as_ref().trim();
            if token.is_empty() || slots.iter().any(|slot| slot.credential.expose() == token) {
                continue;
            }
            slots.push(Slot {
                credential: Credential::new(token),
                cooldown_until: None,
                disabled: false,
            });
        }

        if slots.is_empty() {
            return Err(GithubError::NoCredentials);
        }

        log::debug!("Credential pool initialised with {} credentials", slots.len());
        Ok(Self {
            state: Mutex::new(PoolState { slots, cursor: 0 }),
            clock,
            min_cooldown: Duration::seconds(DEFAULT_MIN_COOLDOWN_SECS),
        })
    }

    /// Cooldown applied when a rate-limit response carries no reset hint
    pub fn with_min_cooldown(mut self, min_cooldown: Duration) -> Self {
        self.min_cooldown = min_cooldown;
        self
    }

    pub fn size(&self) -> usize {
        self.lock().map(|state| state.slots.len()).unwrap_or(0)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Next usable credential in round-robin order
    ///
    /// Fails with `Exhausted` (earliest cooldown attached) when every enabled
    /// credential is cooling down, or `NoCredentials` when all are disabled.
    pub fn acquire(&self) -> GithubResult<Credential> {
        let now = self.clock.now();
        let mut state = self.lock()?;
        let count = state.slots.len();

        for offset in 0..count {
            let index = (state.cursor + offset) % count;
            if state.slots[index].usable_at(now) {
                state.cursor = (index + 1) % count;
                return Ok(state.slots[index].credential.clone());
            }
        }

        match earliest_cooldown(&state.slots, now) {
            Some(retry_at) => Err(GithubError::Exhausted { retry_at }),
            None => Err(GithubError::NoCredentials),
        }
    }

    /// Put a credential into cooldown
    ///
    /// Uses `reset_hint` when given, otherwise now plus the minimum cooldown.
    /// An existing later deadline is never shortened.
    pub fn mark_cooled_down(
        &self,
        credential: &Credential,
        reset_hint: Option<DateTime<Utc>>,
    ) -> GithubResult<DateTime<Utc>> {
        let now = self.clock.now();
        let target = reset_hint
            .unwrap_or(now + self.min_cooldown)
            .max(now + Duration::seconds(1));

        let mut state = self.lock()?;
        let slot = state
            .slots
            .iter_mut()
            .find(|slot| &slot.credential == credential)
            .ok_or_else(|| GithubError::Internal(format!("unknown credential {}", credential)))?;

        let deadline = slot.cooldown_until.map_or(target, |existing| existing.max(target));
        slot.cooldown_until = Some(deadline);
        log::info!("Credential {} cooling down until {}", credential, deadline);
        Ok(deadline)
    }

    /// Permanently retire a credential for the life of the process
    pub fn disable(&self, credential: &Credential) -> GithubResult<()> {
        let mut state = self.lock()?;
        if let Some(slot) = state
            .slots
            .iter_mut()
            .find(|slot| &slot.credential == credential)
        {
            if !slot.disabled {
                log::warn!("Disabling credential {}", credential);
            }
            slot.disabled = true;
        }
        Ok(())
    }

    /// Earliest time any enabled credential becomes usable
    ///
    /// Returns `now` when a credential is usable already and `None` when every
    /// credential is disabled.
    pub fn next_available_at(&self) -> Option<DateTime<Utc>> {
        let now = self.clock.now();
        let state = self.lock().ok()?;
        earliest_cooldown(&state.slots, now)
    }

    fn lock(&self) -> GithubResult<std::sync::MutexGuard<'_, PoolState>> {
        handle_mutex_poison(self.state.lock(), GithubError::Internal)
    }
}

fn earliest_cooldown(slots: &[Slot], now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    slots
        .iter()
        .filter(|slot| !slot.disabled)
        .map(|slot| slot.cooldown_until.map_or(now, |until| until.max(now)))
        .min()
}
