/// Mutation Authentication
///
/// Double-submit CSRF check for state-changing routes. The session token must
/// arrive twice: as the cookie the session filter already verified, and as an
/// `Authorization: Bearer` header that only same-origin script can set.
/// Read-only with respect to session state; the identity store is not consulted.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::auth::claims::Claims;
use crate::auth::jwt::{TokenCodec, TokenKind};
use crate::auth::session::SessionContext;
use crate::error::AuthError;

/// Extract the token from an `Authorization: Bearer <token>` header value
///
/// The scheme is matched case-insensitively.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

// Hash first so the comparison length never depends on the inputs
fn same_token(a: &str, b: &str) -> bool {
    let a = Sha256::digest(a.as_bytes());
    let b = Sha256::digest(b.as_bytes());
    a.as_slice().ct_eq(b.as_slice()).into()
}

#[derive(Clone)]
pub struct MutationGuard {
    codec: Arc<TokenCodec>,
}

impl MutationGuard {
    pub fn new(codec: Arc<TokenCodec>) -> Self {
        Self { codec }
    }

    pub fn check(&self, authorization: Option<&str>, context: &SessionContext) -> Result<Claims, AuthError> {
        self.check_at(authorization, context, chrono::Utc::now().timestamp())
    }

    /// Check the double-submit pair as of `now`
    ///
    /// # Errors
    /// - `Forbidden` if the header is missing, or names a different token than the cookie
    /// - `Unauthorized` if the header is not a bearer token, or its token does
    ///   not verify or has expired
    pub fn check_at(
        &self,
        authorization: Option<&str>,
        context: &SessionContext,
        now: i64,
    ) -> Result<Claims, AuthError> {
        let Some(header) = authorization else {
            tracing::warn!(tracker = %context.tracker, "Mutation without double-submit header");
            return Err(AuthError::Forbidden("missing authorization header"));
        };
        let Some(token) = bearer_token(header) else {
            tracing::warn!(tracker = %context.tracker, "Mutation header is not a bearer token");
            return Err(AuthError::INVALID_TOKEN);
        };

        let claims = self.codec.verify_at(TokenKind::Session, token, now).map_err(|e| {
            tracing::warn!(tracker = %context.tracker, error = %e, "Mutation header token rejected");
            AuthError::INVALID_TOKEN
        })?;

        let matches_cookie = context
            .presented_token
            .as_deref()
            .is_some_and(|cookie| same_token(cookie, token));

        if !matches_cookie || claims.sub != context.tracker {
            tracing::warn!(
                tracker = %context.tracker,
                header_sub = %claims.sub,
                "Double-submit mismatch"
            );
            return Err(AuthError::Forbidden("double-submit mismatch"));
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Member;

    const SECRET: &[u8] = b"test-secret-key-at-least-32-characters-long";
    const NOW: i64 = 1_700_000_000;

    fn setup() -> (MutationGuard, Arc<TokenCodec>, String, SessionContext) {
        let codec = Arc::new(TokenCodec::new("http://localhost:8000", SECRET));
        let (token, claims) = codec.mint(TokenKind::Session, "abc12345", 3_600, NOW).unwrap();
        let context = SessionContext {
            tracker: "abc12345".to_string(),
            member: Member::new("abc12345"),
            claims,
            presented_token: Some(token.clone()),
            renewed: false,
        };
        (MutationGuard::new(codec.clone()), codec, token, context)
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(bearer_token("bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(bearer_token("BEARER   abc.def.ghi "), Some("abc.def.ghi"));
        assert_eq!(bearer_token("Basic dXNlcjpwYXNz"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc.def.ghi"), None);
        assert_eq!(bearer_token(""), None);
    }

    #[test]
    fn test_lowercase_scheme_is_accepted() {
        let (guard, _, token, context) = setup();
        let header = format!("bearer {}", token);

        assert!(guard.check_at(Some(&header), &context, NOW).is_ok());
    }

    #[test]
    fn test_present_but_non_bearer_header_is_unauthorized() {
        let (guard, _, _, context) = setup();

        for header in ["Basic xyz", "Bearer", "", "garbage"] {
            assert_eq!(
                guard.check_at(Some(header), &context, NOW),
                Err(AuthError::INVALID_TOKEN),
                "header {:?}",
                header
            );
        }
    }

    #[test]
    fn test_missing_header_is_forbidden() {
        let (guard, _, _, context) = setup();

        assert!(matches!(
            guard.check_at(None, &context, NOW),
            Err(AuthError::Forbidden(_))
        ));
    }

    #[test]
    fn test_matching_header_is_accepted() {
        let (guard, _, token, context) = setup();
        let header = format!("Bearer {}", token);

        let claims = guard.check_at(Some(&header), &context, NOW + 1).unwrap();
        assert_eq!(claims.sub, "abc12345");
    }

    #[test]
    fn test_token_for_other_sub_is_forbidden() {
        let (guard, codec, _, context) = setup();
        let (other, _) = codec.mint(TokenKind::Session, "zzz99999", 3_600, NOW).unwrap();
        let header = format!("Bearer {}", other);

        assert!(matches!(
            guard.check_at(Some(&header), &context, NOW),
            Err(AuthError::Forbidden(_))
        ));
    }

    #[test]
    fn test_same_sub_but_different_token_is_forbidden() {
        let (guard, codec, _, context) = setup();
        let (sibling, _) = codec.mint(TokenKind::Session, "abc12345", 3_600, NOW + 5).unwrap();
        let header = format!("Bearer {}", sibling);

        assert!(matches!(
            guard.check_at(Some(&header), &context, NOW + 5),
            Err(AuthError::Forbidden(_))
        ));
    }

    #[test]
    fn test_unverifiable_header_is_unauthorized() {
        let (guard, _, _, context) = setup();

        assert_eq!(
            guard.check_at(Some("Bearer not.a.token"), &context, NOW),
            Err(AuthError::INVALID_TOKEN)
        );
    }

    #[test]
    fn test_expired_header_is_unauthorized() {
        let (guard, _, token, context) = setup();
        let header = format!("Bearer {}", token);

        assert_eq!(
            guard.check_at(Some(&header), &context, NOW + 3_600),
            Err(AuthError::INVALID_TOKEN)
        );
    }

    #[test]
    fn test_no_presented_cookie_is_forbidden() {
        let (guard, _, token, mut context) = setup();
        context.presented_token = None;
        let header = format!("Bearer {}", token);

        assert!(matches!(
            guard.check_at(Some(&header), &context, NOW),
            Err(AuthError::Forbidden(_))
        ));
    }
}
