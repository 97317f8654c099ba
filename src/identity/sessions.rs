use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::identity::LoginResponse;
use crate::models::actor::Actor;

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(8 * 60 * 60);

struct Session {
    actor: Actor,
    last_seen: Instant,
}

/// Server-side record of verified sessions: bearer token to actor. A session
/// expires after `idle_timeout` without a successful `resolve`.
pub struct SessionRegistry {
    sessions: DashMap<String, Session>,
    idle_timeout: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TIMEOUT)
    }
}

impl SessionRegistry {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            idle_timeout,
        }
    }

    pub fn register(&self, login: &LoginResponse) -> Actor {
        let actor = Actor::new(login.user.id.clone(), login.role);
        self.insert(login.token.clone(), actor.clone());
        actor
    }

    /// Registers a session directly, for callers that verified the token
    /// themselves.
    pub fn insert(&self, token: impl Into<String>, actor: Actor) {
        self.sessions.insert(
            token.into(),
            Session {
                actor,
                last_seen: Instant::now(),
            },
        );
    }

    pub fn resolve(&self, token: &str) -> Option<Actor> {
        self.resolve_at(token, Instant::now())
    }

    pub fn revoke(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    /// Drops idle sessions. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn resolve_at(&self, token: &str, now: Instant) -> Option<Actor> {
        {
            let mut session = self.sessions.get_mut(token)?;
            if !self.is_idle(&session, now) {
                session.last_seen = now;
                return Some(session.actor.clone());
            }
        }

        self.sessions
            .remove_if(token, |_, session| self.is_idle(session, now));
        None
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !self.is_idle(session, now));
        before.saturating_sub(self.sessions.len())
    }

    fn is_idle(&self, session: &Session, now: Instant) -> bool {
        now.saturating_duration_since(session.last_seen) >= self.idle_timeout
    }
}
