//! Request identity and server-side pending actions.
//!
//! Authentication happens upstream. The auth layer either inserts an
//! [`Identity`] into the request extensions or forwards the verified address
//! in the trusted [`AUTHENTICATED_EMAIL_HEADER`].

use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use axum_extra::extract::cookie::CookieJar;
use dashmap::DashMap;
use std::convert::Infallible;
use std::time::{Duration, Instant};

pub const AUTHENTICATED_EMAIL_HEADER: &str = "x-authenticated-email";
pub const SESSION_COOKIE: &str = "sessionid";

/// How long an anonymous visitor has to sign in before a saved query is dropped.
pub const PENDING_ALERT_TTL: Duration = Duration::from_secs(60 * 60 * 24);
/// Upper bound on queries held for anonymous sessions.
pub const MAX_PENDING_ALERTS: usize = 10_000;

/// The caller's verified email, if any.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Identity {
    pub email: Option<String>,
}

impl Identity {
    pub fn authenticated(email: &str) -> Self {
        Self {
            email: Some(email.trim().to_lowercase()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is(&self, email: &str) -> bool {
        self.email.as_deref() == Some(email)
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<Identity>() {
            return Ok(identity.clone());
        }
        let email = parts
            .headers
            .get(AUTHENTICATED_EMAIL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_lowercase())
            .filter(|v| !v.is_empty());
        Ok(Identity { email })
    }
}

/// Value of the `sessionid` cookie, when the client sent one.
#[derive(Clone, Debug, Default)]
pub struct SessionId(pub Option<String>);

impl SessionId {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let id = CookieJar::from_headers(headers)
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty());
        SessionId(id)
    }
}

impl<S> FromRequestParts<S> for SessionId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(SessionId::from_headers(&parts.headers))
    }
}

pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[derive(Debug)]
struct PendingAlert {
    query: String,
    stashed_at: Instant,
}

/// Queries submitted by anonymous visitors, keyed by session id, waiting to
/// become subscriptions once the visitor signs in.
///
/// Entries expire after `ttl`. The map never holds more than `capacity`
/// entries; when full, the oldest one is evicted.
#[derive(Debug)]
pub struct PendingAlerts {
    pending: DashMap<String, PendingAlert>,
    ttl: Duration,
    capacity: usize,
}

impl Default for PendingAlerts {
    fn default() -> Self {
        Self::with_limits(PENDING_ALERT_TTL, MAX_PENDING_ALERTS)
    }
}

impl PendingAlerts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(ttl: Duration, capacity: usize) -> Self {
        Self {
            pending: DashMap::new(),
            ttl,
            capacity: capacity.max(1),
        }
    }

    fn is_expired(&self, alert: &PendingAlert) -> bool {
        alert.stashed_at.elapsed() >= self.ttl
    }

    /// Drops every expired entry.
    pub fn purge_expired(&self) {
        self.pending.retain(|_, alert| !self.is_expired(alert));
    }

    /// Stores `query` for `session_id`, replacing any earlier one.
    pub fn stash(&self, session_id: &str, query: String) {
        self.purge_expired();
        if !self.pending.contains_key(session_id) && self.pending.len() >= self.capacity {
            let oldest = self
                .pending
                .iter()
                .min_by_key(|entry| entry.value().stashed_at)
                .map(|entry| entry.key().clone());
            if let Some(key) = oldest {
                tracing::warn!(
                    name = "session.pending_alerts.evicted",
                    target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                    capacity = self.capacity,
                    message = "Pending alert map full; evicting oldest entry"
                );
                self.pending.remove(&key);
            }
        }
        self.pending.insert(
            session_id.to_string(),
            PendingAlert {
                query,
                stashed_at: Instant::now(),
            },
        );
    }

    /// Removes and returns the pending query in one step, so it is consumed
    /// at most once even under concurrent requests. Expired entries are
    /// removed but not returned.
    pub fn take(&self, session_id: &str) -> Option<String> {
        let (_, alert) = self.pending.remove(session_id)?;
        if self.is_expired(&alert) {
            return None;
        }
        Some(alert.query)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, header};

    #[test]
    fn pending_query_is_taken_once() {
        let pending = PendingAlerts::new();
        pending.stash("abc", "carbon tax".into());
        pending.stash("abc", "pipelines".into());
        assert_eq!(pending.len(), 1);
        assert_eq!(pending.take("abc").as_deref(), Some("pipelines"));
        assert_eq!(pending.take("abc"), None);
        assert!(pending.is_empty());
    }

    #[test]
    fn expired_queries_are_dropped() {
        let pending = PendingAlerts::with_limits(Duration::ZERO, 10);
        pending.stash("abc", "pipelines".into());
        assert_eq!(pending.take("abc"), None);

        pending.stash("one", "pipelines".into());
        pending.stash("two", "pipelines".into());
        assert_eq!(pending.len(), 1);
        pending.purge_expired();
        assert!(pending.is_empty());
    }

    #[test]
    fn full_map_evicts_oldest() {
        let pending = PendingAlerts::with_limits(PENDING_ALERT_TTL, 2);
        pending.stash("first", "a".into());
        pending.stash("second", "b".into());
        pending.stash("second", "c".into());
        assert_eq!(pending.len(), 2);

        pending.stash("third", "d".into());
        assert_eq!(pending.len(), 2);
        assert_eq!(pending.take("first"), None);
        assert_eq!(pending.take("second").as_deref(), Some("c"));
        assert_eq!(pending.take("third").as_deref(), Some("d"));
    }

    #[test]
    fn session_id_from_cookies() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("a=1; sessionid=xyz"));
        headers.append(header::COOKIE, HeaderValue::from_static("enable-alerts=y"));
        assert_eq!(SessionId::from_headers(&headers).0.as_deref(), Some("xyz"));

        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("sessionid=; other=1"));
        assert_eq!(SessionId::from_headers(&headers).0, None);
        assert_eq!(SessionId::from_headers(&HeaderMap::new()).0, None);
    }

    #[test]
    fn identity_comparison_is_exact() {
        let identity = Identity::authenticated(" Jane@Example.org ");
        assert!(identity.is("jane@example.org"));
        assert!(!Identity::anonymous().is("jane@example.org"));
    }
}
