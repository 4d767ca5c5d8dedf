/// Refresh Policy
///
/// Pure decision logic for the session filter: given the verified claims the
/// agent presented (if any), decide whether the current session token can be
/// reused as-is or whether tokens must be re-minted.

use crate::auth::claims::Claims;
use crate::configuration::SessionSettings;

/// Why a request left the fast path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewReason {
    /// No valid refresh token: a new lineage starts
    NoRefreshToken,
    /// No valid session token was presented
    NoSessionToken,
    /// Session token valid but inside the early-refresh window
    SessionExpiring,
    /// Session and refresh tokens name different trackers
    LineageMismatch,
}

impl RenewReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenewReason::NoRefreshToken => "no_refresh_token",
            RenewReason::NoSessionToken => "no_session_token",
            RenewReason::SessionExpiring => "session_expiring",
            RenewReason::LineageMismatch => "lineage_mismatch",
        }
    }
}

/// Outcome of the refresh policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Renewal {
    /// Reuse the presented session token; write no cookies
    Fresh(Claims),
    /// Consult the identity store and mint new tokens
    Renew {
        prior_sub: Option<String>,
        refresh_valid: bool,
        reason: RenewReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    pub refresh_max_age: i64,
    pub session_max_age: i64,
    pub session_early_refresh: i64,
}

impl RefreshPolicy {
    pub fn from_settings(settings: &SessionSettings) -> Self {
        Self {
            refresh_max_age: settings.refresh_max_age,
            session_max_age: settings.session_max_age,
            session_early_refresh: settings.session_early_refresh,
        }
    }

    /// Decide what to do with the presented tokens
    ///
    /// `refresh` and `session` are the claims of tokens that verified;
    /// absent, forged and expired tokens are all `None` here.
    pub fn decide(&self, refresh: Option<&Claims>, session: Option<&Claims>, now: i64) -> Renewal {
        let Some(refresh) = refresh else {
            return Renewal::Renew {
                prior_sub: None,
                refresh_valid: false,
                reason: RenewReason::NoRefreshToken,
            };
        };

        let reason = match session {
            None => RenewReason::NoSessionToken,
            Some(session) if session.sub != refresh.sub => RenewReason::LineageMismatch,
            Some(session) if session.remaining_at(now) < self.session_early_refresh => {
                RenewReason::SessionExpiring
            }
            Some(session) => return Renewal::Fresh(session.clone()),
        };

        Renewal::Renew {
            prior_sub: Some(refresh.sub.clone()),
            refresh_valid: true,
            reason,
        }
    }

    /// A refresh token is minted when the old one is unusable or when the
    /// store moved the agent to a different tracker
    pub fn needs_refresh_token(refresh_valid: bool, prior_sub: Option<&str>, resolved_sub: &str) -> bool {
        !refresh_valid || prior_sub != Some(resolved_sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn policy() -> RefreshPolicy {
        RefreshPolicy {
            refresh_max_age: 86_400,
            session_max_age: 3_600,
            session_early_refresh: 600,
        }
    }

    fn claims(sub: &str, iat: i64, max_age: i64) -> Claims {
        Claims::new("iss", sub, iat, max_age).unwrap()
    }

    #[test]
    fn test_fresh_session_takes_fast_path() {
        let refresh = claims("abc", NOW - 100, 86_400);
        let session = claims("abc", NOW - 100, 3_600);

        assert_eq!(
            policy().decide(Some(&refresh), Some(&session), NOW),
            Renewal::Fresh(session)
        );
    }

    #[test]
    fn test_early_refresh_window_boundary() {
        let refresh = claims("abc", NOW - 100, 86_400);
        // exactly 600s left: still fresh
        let at_threshold = claims("abc", NOW - 3_000, 3_600);
        assert!(matches!(
            policy().decide(Some(&refresh), Some(&at_threshold), NOW),
            Renewal::Fresh(_)
        ));

        let inside = claims("abc", NOW - 3_001, 3_600);
        assert_eq!(
            policy().decide(Some(&refresh), Some(&inside), NOW),
            Renewal::Renew {
                prior_sub: Some("abc".to_string()),
                refresh_valid: true,
                reason: RenewReason::SessionExpiring,
            }
        );
    }

    #[test]
    fn test_missing_session_keeps_lineage() {
        let refresh = claims("abc", NOW - 100, 86_400);

        assert_eq!(
            policy().decide(Some(&refresh), None, NOW),
            Renewal::Renew {
                prior_sub: Some("abc".to_string()),
                refresh_valid: true,
                reason: RenewReason::NoSessionToken,
            }
        );
    }

    #[test]
    fn test_missing_refresh_starts_new_lineage_even_with_fresh_session() {
        let session = claims("abc", NOW - 100, 3_600);

        assert_eq!(
            policy().decide(None, Some(&session), NOW),
            Renewal::Renew {
                prior_sub: None,
                refresh_valid: false,
                reason: RenewReason::NoRefreshToken,
            }
        );
    }

    #[test]
    fn test_session_from_other_lineage_is_renewed() {
        let refresh = claims("abc", NOW - 100, 86_400);
        let session = claims("xyz", NOW - 100, 3_600);

        assert!(matches!(
            policy().decide(Some(&refresh), Some(&session), NOW),
            Renewal::Renew { reason: RenewReason::LineageMismatch, .. }
        ));
    }

    #[test]
    fn test_needs_refresh_token() {
        assert!(RefreshPolicy::needs_refresh_token(false, None, "abc"));
        assert!(RefreshPolicy::needs_refresh_token(true, Some("abc"), "xyz"));
        assert!(!RefreshPolicy::needs_refresh_token(true, Some("abc"), "abc"));
    }
}
