//! Per-user service quotas.
//!
//! Each user may be granted access to a closed set of services, each with
//! a request allowance. Revoking a service removes its record outright.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Upstream services a user can be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceId {
    Weather,
    Places,
}

impl ServiceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::Places => "places",
        }
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceId {
    type Err = UsageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weather" => Ok(Self::Weather),
            "places" => Ok(Self::Places),
            _ => Err(UsageError::UnknownService(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub requests_made: u32,
    pub max_requests: u32,
}

impl UsageRecord {
    pub fn remaining(&self) -> u32 {
        self.max_requests.saturating_sub(self.requests_made)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("unknown service '{0}'")]
    UnknownService(String),
    #[error("service '{0}' has not been granted")]
    NotGranted(ServiceId),
    #[error("quota exceeded for '{service}': {used}/{max} requests")]
    QuotaExceeded { service: ServiceId, used: u32, max: u32 },
}

/// One user's granted services.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceUsage(BTreeMap<ServiceId, UsageRecord>);

impl ServiceUsage {
    /// Grant `service`, or change its allowance. Requests already made are kept.
    pub fn grant(&mut self, service: ServiceId, max_requests: u32) -> UsageRecord {
        let record = self
            .0
            .entry(service)
            .and_modify(|r| r.max_requests = max_requests)
            .or_insert(UsageRecord {
                requests_made: 0,
                max_requests,
            });
        *record
    }

    /// Remove `service`. Returns the record it had, if any.
    pub fn revoke(&mut self, service: ServiceId) -> Option<UsageRecord> {
        self.0.remove(&service)
    }

    /// Count one request against `service`.
    pub fn consume(&mut self, service: ServiceId) -> Result<UsageRecord, UsageError> {
        let record = self
            .0
            .get_mut(&service)
            .ok_or(UsageError::NotGranted(service))?;
        if record.requests_made >= record.max_requests {
            return Err(UsageError::QuotaExceeded {
                service,
                used: record.requests_made,
                max: record.max_requests,
            });
        }
        record.requests_made += 1;
        Ok(*record)
    }

    pub fn get(&self, service: ServiceId) -> Option<UsageRecord> {
        self.0.get(&service).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Service usage for every known user.
#[derive(Debug, Default)]
pub struct UsageLedger {
    users: HashMap<String, ServiceUsage>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn usage(&self, user: &str) -> ServiceUsage {
        self.users.get(user).cloned().unwrap_or_default()
    }

    pub fn grant(&mut self, user: &str, service: ServiceId, max_requests: u32) -> UsageRecord {
        self.users
            .entry(user.to_string())
            .or_default()
            .grant(service, max_requests)
    }

    pub fn revoke(&mut self, user: &str, service: ServiceId) -> Option<UsageRecord> {
        let usage = self.users.get_mut(user)?;
        let removed = usage.revoke(service);
        if usage.is_empty() {
            self.users.remove(user);
        }
        removed
    }

    pub fn consume(&mut self, user: &str, service: ServiceId) -> Result<UsageRecord, UsageError> {
        match self.users.get_mut(user) {
            Some(usage) => usage.consume(service),
            None => Err(UsageError::NotGranted(service)),
        }
    }
}
