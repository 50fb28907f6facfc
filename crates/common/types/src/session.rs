// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ResourceLimits, SessionId, WorkerId};

/// Caller-supplied options for creating a session, echoed back into the
/// session record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct SessionOptions {
    pub repo_url: Option<String>,
    /// Session lifetime in seconds from creation.
    pub timeout_secs: Option<u64>,
    pub resource_limits: Option<ResourceLimits>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

/// A long-lived container execution context bound to one worker; multiple
/// tasks may execute within it sequentially.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Session {
    pub id: SessionId,
    pub worker_id: WorkerId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub options: SessionOptions,
}

/// Default session lifetime when the caller doesn't specify one.
pub const DEFAULT_SESSION_TIMEOUT_SECS: i64 = 3600;

impl Session {
    #[must_use]
    pub fn new(worker_id: WorkerId, options: SessionOptions) -> Self {
        let now = Utc::now();
        let ttl = options.timeout_secs.map_or(DEFAULT_SESSION_TIMEOUT_SECS, |secs| i64::try_from(secs).unwrap_or(i64::MAX));
        Self {
            id: SessionId::generate(),
            worker_id,
            created_at: now,
            expires_at: now + chrono::Duration::seconds(ttl),
            last_activity: now,
            options,
        }
    }

    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool { self.expires_at < now }

    pub fn touch(&mut self, now: DateTime<Utc>) { self.last_activity = now; }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_session_is_not_expired() {
        let session = Session::new(WorkerId::from("w1"), SessionOptions::default());
        assert!(!session.is_expired_at(Utc::now()));
        assert!(session.created_at <= session.last_activity);
    }

    #[test]
    fn custom_timeout_shrinks_lifetime() {
        let session = Session::new(WorkerId::from("w1"), SessionOptions { timeout_secs: Some(1), ..Default::default() });
        let later = session.created_at + chrono::Duration::seconds(2);
        assert!(session.is_expired_at(later));
    }
}
