//! Database models for bearer sessions.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::types::{IdentityId, SessionId};

/// Database entity model. The raw token is never stored, only its SHA-256 digest.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: SessionId,
    pub identity_id: IdentityId,
    pub token_hash: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Not revoked and, when an expiry is set, not yet past it.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}

/// Request for creating a session
#[derive(Debug, Clone)]
pub struct SessionCreateDBRequest {
    pub identity_id: IdentityId,
    pub token_hash: Vec<u8>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn session(expires_at: Option<DateTime<Utc>>, revoked_at: Option<DateTime<Utc>>) -> Session {
        Session {
            id: Uuid::new_v4(),
            identity_id: Uuid::new_v4(),
            token_hash: vec![0; 32],
            created_at: Utc::now(),
            expires_at,
            revoked_at,
        }
    }

    #[test]
    fn test_is_active() {
        let now = Utc::now();
        assert!(session(None, None).is_active(now));
        assert!(session(Some(now + Duration::minutes(5)), None).is_active(now));
        assert!(!session(Some(now - Duration::seconds(1)), None).is_active(now));
        assert!(!session(Some(now), None).is_active(now));
        assert!(!session(None, Some(now)).is_active(now));
    }
}
