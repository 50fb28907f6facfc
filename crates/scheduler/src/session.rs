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

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use relay_types::{Session, SessionId, SessionOptions, WorkerId};

/// Live container-execution sessions, keyed by id. Expiry is swept
/// periodically rather than on every read, so a session briefly past its
/// `expires_at` is still visible to in-flight requests.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    pub fn create(&mut self, worker_id: WorkerId, options: SessionOptions) -> Session {
        let session = Session::new(worker_id, options);
        self.sessions.insert(session.id.clone(), session.clone());
        session
    }

    /// Records a session whose id is authoritative elsewhere (e.g. the
    /// worker-issued id returned from `POST /sessions`), rather than one
    /// generated here.
    pub fn insert(&mut self, session: Session) { self.sessions.insert(session.id.clone(), session); }

    #[must_use]
    pub fn get(&self, id: &SessionId) -> Option<&Session> { self.sessions.get(id) }

    pub fn touch(&mut self, id: &SessionId, now: DateTime<Utc>) -> bool {
        self.sessions.get_mut(id).is_some_and(|session| {
            session.touch(now);
            true
        })
    }

    pub fn end(&mut self, id: &SessionId) -> Option<Session> { self.sessions.remove(id) }

    pub fn active(&self) -> impl Iterator<Item = &Session> { self.sessions.values() }

    /// Removes every session whose `expires_at` is before `now`, returning
    /// the ones that were swept so the caller can notify their worker.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> Vec<Session> {
        let expired: Vec<SessionId> = self.sessions.values().filter(|s| s.is_expired_at(now)).map(|s| s.id.clone()).collect();
        expired.into_iter().filter_map(|id| self.sessions.remove(&id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_removes_only_expired_sessions() {
        let mut registry = SessionRegistry::new();
        let fresh = registry.create(WorkerId::from("w1"), SessionOptions::default());
        let stale = registry.create(WorkerId::from("w2"), SessionOptions { timeout_secs: Some(1), ..Default::default() });
        let later = stale.created_at + chrono::Duration::seconds(2);
        let swept = registry.sweep_expired(later);
        assert_eq!(swept.len(), 1);
        assert_eq!(swept[0].id, stale.id);
        assert!(registry.get(&fresh.id).is_some());
        assert!(registry.get(&stale.id).is_none());
    }

    #[test]
    fn touch_updates_last_activity_and_reports_presence() {
        let mut registry = SessionRegistry::new();
        let session = registry.create(WorkerId::from("w1"), SessionOptions::default());
        let later = session.last_activity + chrono::Duration::seconds(5);
        assert!(registry.touch(&session.id, later));
        assert_eq!(registry.get(&session.id).unwrap().last_activity, later);
        assert!(!registry.touch(&SessionId::from("missing"), later));
    }

    #[test]
    fn end_removes_and_returns_session() {
        let mut registry = SessionRegistry::new();
        let session = registry.create(WorkerId::from("w1"), SessionOptions::default());
        assert!(registry.end(&session.id).is_some());
        assert!(registry.get(&session.id).is_none());
    }
}
