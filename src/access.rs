//! Login gate for the interactive shell.
//!
//! Credentials come from configuration through a [`CredentialStore`]. The
//! session is a plain value: [`Session::login`] consumes it and returns the
//! next session together with the outcome of the attempt.

use crate::error::{PacError, Result};
use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "seguridad")]
    Security,
    #[serde(rename = "analisis_pac")]
    PacAnalysis,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Security => f.write_str("seguridad"),
            Permission::PacAnalysis => f.write_str("analisis_pac"),
        }
    }
}

/// Configured credentials of one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserEntry {
    pub password: String,
    pub role: String,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockoutPolicy {
    /// Consecutive failures that trigger a lock.
    pub max_attempts: u32,
    pub lock_minutes: i64,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lock_minutes: 3,
        }
    }
}

/// What a successful credential check hands to the session.
#[derive(Debug, Clone, PartialEq)]
pub struct Grant {
    pub role: String,
    pub permissions: Vec<Permission>,
}

pub trait CredentialStore {
    fn validate(&self, username: &str, password: &str) -> Option<Grant>;
}

/// In-memory store keyed by normalized username.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialStore {
    users: BTreeMap<String, UserEntry>,
}

impl StaticCredentialStore {
    pub fn new(users: &BTreeMap<String, UserEntry>) -> Self {
        let users = users
            .iter()
            .map(|(name, entry)| (normalize_username(name), entry.clone()))
            .collect();
        Self { users }
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl CredentialStore for StaticCredentialStore {
    fn validate(&self, username: &str, password: &str) -> Option<Grant> {
        let entry = self.users.get(&normalize_username(username))?;
        (entry.password == password).then(|| Grant {
            role: entry.role.clone(),
            permissions: entry.permissions.clone(),
        })
    }
}

fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveUser {
    pub username: String,
    pub role: String,
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessResult {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessEntry {
    pub username: String,
    pub at: DateTime<Utc>,
    pub result: AccessResult,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    /// A previous lockout is still running; the attempt was not evaluated.
    Locked { remaining_secs: i64 },
    Granted,
    Rejected { remaining: u32 },
    LockedOut { until: DateTime<Utc> },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub user: Option<ActiveUser>,
    pub failed_attempts: u32,
    pub lock_until: Option<DateTime<Utc>>,
    pub history: Vec<AccessEntry>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn login<S: CredentialStore + ?Sized>(
        mut self,
        store: &S,
        policy: &LockoutPolicy,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> (Session, LoginOutcome) {
        if let Some(until) = self.lock_until {
            if now < until {
                let remaining_secs = (until - now).num_seconds();
                return (self, LoginOutcome::Locked { remaining_secs });
            }
            self.lock_until = None;
            self.failed_attempts = 0;
        }

        match store.validate(username, password) {
            Some(grant) => {
                info!("Access granted to '{}' ({})", username.trim(), grant.role);
                self.user = Some(ActiveUser {
                    username: normalize_username(username),
                    role: grant.role,
                    permissions: grant.permissions,
                });
                self.failed_attempts = 0;
                self.record(username, now, AccessResult::Success);
                (self, LoginOutcome::Granted)
            }
            None => {
                self.failed_attempts += 1;
                self.record(username, now, AccessResult::Failure);

                if self.failed_attempts >= policy.max_attempts {
                    let until = now + Duration::minutes(policy.lock_minutes);
                    warn!(
                        "Too many failed logins for '{}', locked until {}",
                        username, until
                    );
                    self.lock_until = Some(until);
                    self.failed_attempts = 0;
                    (self, LoginOutcome::LockedOut { until })
                } else {
                    let remaining = policy.max_attempts - self.failed_attempts;
                    (self, LoginOutcome::Rejected { remaining })
                }
            }
        }
    }

    pub fn logout(mut self) -> Session {
        self.user = None;
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.user
            .as_ref()
            .is_some_and(|u| u.permissions.contains(&permission))
    }

    pub fn authorize(&self, permission: Permission) -> Result<&ActiveUser> {
        match &self.user {
            None => Err(PacError::AccessDenied("no active session".to_string())),
            Some(user) if user.permissions.contains(&permission) => Ok(user),
            Some(user) => Err(PacError::AccessDenied(format!(
                "user '{}' lacks permission '{}'",
                user.username, permission
            ))),
        }
    }

    /// Last `n` entries, oldest first.
    pub fn recent_history(&self, n: usize) -> &[AccessEntry] {
        let start = self.history.len().saturating_sub(n);
        &self.history[start..]
    }

    fn record(&mut self, username: &str, at: DateTime<Utc>, result: AccessResult) {
        self.history.push(AccessEntry {
            username: username.to_string(),
            at,
            result,
        });
    }
}
