//! Session state machine
//!
//! Pure bookkeeping for one provider's login session. The watcher feeds it one
//! reading per poll tick and acts on the transitions it returns; the machine
//! itself never sleeps or reads a clock.
//!
//! The import rate limit lives in [`ImportLimiter`], outside the machine, so
//! resetting a machine never lifts it.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::auth::Fingerprint;
use crate::config::BridgeConfig;
use crate::providers::ProviderId;

/// Login phase of the monitored provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No reading taken yet
    Unmonitored,
    LoggedOut,
    LoggedIn,
    /// Logged in, but the last readings were unauthenticated
    PendingLogout,
}

/// Something that happened while processing a reading
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// First authenticated reading after being logged out or unmonitored
    LoggedIn,
    /// Logout timer started
    LogoutPending { since: DateTime<Utc> },
    /// An authenticated reading arrived before the debounce window elapsed
    LogoutCancelled,
    /// Logout confirmed; the side effects should run now
    LoggedOut,
    /// Session cookies differ from the last snapshot
    CookiesChanged { fingerprint: Fingerprint },
    ImportScheduled { due: DateTime<Utc> },
    /// A scheduled import should run with the cookies of this reading
    ImportDue,
}

/// Timing knobs for [`SessionMachine`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTiming {
    pub logout_debounce: Duration,
    pub import_delay: Duration,
    pub min_import_interval: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            logout_debounce: Duration::milliseconds(5000),
            import_delay: Duration::milliseconds(1500),
            min_import_interval: Duration::milliseconds(10_000),
        }
    }
}

impl From<&BridgeConfig> for SessionTiming {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            logout_debounce: config.logout_debounce(),
            import_delay: config.import_delay(),
            min_import_interval: config.min_import_interval(),
        }
    }
}

/// Time of the last import per provider
#[derive(Debug, Clone, Default)]
pub struct ImportLimiter {
    last: HashMap<ProviderId, Option<DateTime<Utc>>>,
}

impl ImportLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_import(&self, provider: &ProviderId) -> Option<DateTime<Utc>> {
        self.last.get(provider).copied().flatten()
    }

    /// The provider's slot, handed to [`SessionMachine::observe`]
    pub fn slot(&mut self, provider: &ProviderId) -> &mut Option<DateTime<Utc>> {
        self.last.entry(provider.clone()).or_default()
    }
}

/// `at + by`, pinned to the latest representable time instead of overflowing
fn saturating_add(at: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    at.checked_add_signed(by).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[derive(Debug, Clone)]
pub struct SessionMachine {
    timing: SessionTiming,
    logged_in: Option<bool>,
    fingerprint: Option<Fingerprint>,
    logout_since: Option<DateTime<Utc>>,
    pending_import: Option<DateTime<Utc>>,
}

impl SessionMachine {
    pub fn new(timing: SessionTiming) -> Self {
        Self {
            timing,
            logged_in: None,
            fingerprint: None,
            logout_since: None,
            pending_import: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        match self.logged_in {
            None => SessionPhase::Unmonitored,
            Some(false) => SessionPhase::LoggedOut,
            Some(true) if self.logout_since.is_some() => SessionPhase::PendingLogout,
            Some(true) => SessionPhase::LoggedIn,
        }
    }

    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        self.fingerprint.as_ref()
    }

    /// When the scheduled import comes due, if one is scheduled
    pub fn pending_import(&self) -> Option<DateTime<Utc>> {
        self.pending_import
    }

    /// Forgets the session
    ///
    /// Used when the page switches to another provider.
    pub fn reset(&mut self) {
        *self = Self::new(self.timing);
    }

    /// Processes one cookie reading taken at `now`
    ///
    /// `fingerprint` is only looked at for authenticated readings.
    /// `last_import` is the provider's rate-limit slot; it is read when an
    /// import is scheduled and set when one comes due.
    pub fn observe(
        &mut self,
        now: DateTime<Utc>,
        authenticated: bool,
        fingerprint: Option<Fingerprint>,
        last_import: &mut Option<DateTime<Utc>>,
    ) -> Vec<Transition> {
        if authenticated {
            self.observe_authenticated(now, fingerprint, last_import)
        } else {
            self.observe_unauthenticated(now)
        }
    }

    fn observe_authenticated(
        &mut self,
        now: DateTime<Utc>,
        fingerprint: Option<Fingerprint>,
        last_import: &mut Option<DateTime<Utc>>,
    ) -> Vec<Transition> {
        let mut transitions = Vec::new();

        if self.logout_since.take().is_some() {
            transitions.push(Transition::LogoutCancelled);
        }

        if self.logged_in != Some(true) {
            self.logged_in = Some(true);
            transitions.push(Transition::LoggedIn);
        }

        if let Some(fingerprint) = fingerprint {
            if self.fingerprint != Some(fingerprint) {
                self.fingerprint = Some(fingerprint);
                transitions.push(Transition::CookiesChanged { fingerprint });

                // Further changes ride along with the import already scheduled
                if self.pending_import.is_none() {
                    let due = self.next_import_slot(now, *last_import);
                    self.pending_import = Some(due);
                    transitions.push(Transition::ImportScheduled { due });
                }
            }
        }

        if self.pending_import.is_some_and(|due| now >= due) {
            self.pending_import = None;
            *last_import = Some(now);
            transitions.push(Transition::ImportDue);
        }

        transitions
    }

    fn observe_unauthenticated(&mut self, now: DateTime<Utc>) -> Vec<Transition> {
        if self.logged_in != Some(true) {
            self.logged_in = Some(false);
            self.fingerprint = None;
            self.pending_import = None;
            return Vec::new();
        }

        match self.logout_since {
            None => {
                self.logout_since = Some(now);
                vec![Transition::LogoutPending { since: now }]
            }
            Some(since) if now - since > self.timing.logout_debounce => {
                self.logged_in = Some(false);
                self.fingerprint = None;
                self.logout_since = None;
                self.pending_import = None;
                vec![Transition::LoggedOut]
            }
            Some(_) => Vec::new(),
        }
    }

    fn next_import_slot(
        &self,
        now: DateTime<Utc>,
        last_import: Option<DateTime<Utc>>,
    ) -> DateTime<Utc> {
        let delayed = saturating_add(now, self.timing.import_delay);
        match last_import {
            Some(last) => delayed.max(saturating_add(last, self.timing.min_import_interval)),
            None => delayed,
        }
    }
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new(SessionTiming::default())
    }
}
