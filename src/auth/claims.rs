/// Token Claims
///
/// The claim set shared by refresh and session tokens. Both kinds carry the
/// same four registered claims; only their lifetime differs.

use serde::{Deserialize, Serialize};

use crate::error::TokenError;

/// Signed claims of a refresh or session token
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Issuer (normally the service's root URL)
    pub iss: String,
    /// Subject: the tracker naming the agent lineage
    pub sub: String,
    /// Issued at (Unix timestamp, seconds)
    pub iat: i64,
    /// Expiration time (Unix timestamp, seconds)
    pub exp: i64,
}

impl Claims {
    /// Create claims issued at `now` that expire `max_age` seconds later
    ///
    /// # Errors
    /// Returns `TokenError::Encoding` if `now + max_age` overflows.
    pub fn new(issuer: &str, tracker: &str, now: i64, max_age: i64) -> Result<Self, TokenError> {
        let exp = now
            .checked_add(max_age)
            .ok_or_else(|| TokenError::Encoding(format!("max_age {} overflows exp", max_age)))?;

        Ok(Self {
            iss: issuer.to_string(),
            sub: tracker.to_string(),
            iat: now,
            exp,
        })
    }

    /// A token is expired once `now >= exp`
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.exp
    }

    /// Seconds left before expiry (negative once expired)
    pub fn remaining_at(&self, now: i64) -> i64 {
        self.exp - now
    }

    pub fn is_well_formed(&self) -> bool {
        !self.sub.is_empty() && self.exp > self.iat
    }
}
