/// Token Signing and Verification
///
/// Compact HS256 tokens over `{iss, sub, iat, exp}`. The codec is stateless;
/// the issuer and shared secret are fixed at construction. Refresh and session
/// tokens share a claim shape but are signed under separate keys derived from
/// the secret, so a token of one kind never verifies as the other.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sha2::{Digest, Sha256};

use crate::auth::claims::Claims;
use crate::configuration::SessionSettings;
use crate::error::TokenError;

/// Which of the two tokens a value is meant to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Refresh,
    Session,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Refresh => "refresh",
            TokenKind::Session => "session",
        }
    }
}

#[derive(Clone)]
struct KindKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KindKeys {
    // HMAC key = SHA-256(kind || 0x00 || secret)
    fn derive(kind: TokenKind, secret: &[u8]) -> Self {
        let key = Sha256::new()
            .chain_update(kind.as_str().as_bytes())
            .chain_update([0u8])
            .chain_update(secret)
            .finalize();

        Self {
            encoding: EncodingKey::from_secret(&key),
            decoding: DecodingKey::from_secret(&key),
        }
    }
}

/// Signs and verifies refresh and session tokens
#[derive(Clone)]
pub struct TokenCodec {
    issuer: String,
    refresh: KindKeys,
    session: KindKeys,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(issuer: &str, secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["iss", "sub", "iat", "exp"]);
        // Expiry is checked against an explicit clock in `verify_at`
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            issuer: issuer.to_string(),
            refresh: KindKeys::derive(TokenKind::Refresh, secret),
            session: KindKeys::derive(TokenKind::Session, secret),
            validation,
        }
    }

    pub fn from_settings(settings: &SessionSettings) -> Self {
        Self::new(&settings.issuer, settings.secret.as_bytes())
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    fn keys(&self, kind: TokenKind) -> &KindKeys {
        match kind {
            TokenKind::Refresh => &self.refresh,
            TokenKind::Session => &self.session,
        }
    }

    /// Sign a claim set as a token of `kind`
    ///
    /// Signing is deterministic: the same claims always produce the same token.
    ///
    /// # Errors
    /// Returns `TokenError::Encoding` if the claims are malformed
    /// (empty subject, or `exp <= iat`).
    pub fn sign(&self, kind: TokenKind, claims: &Claims) -> Result<String, TokenError> {
        if !claims.is_well_formed() {
            return Err(TokenError::Encoding(
                "claims need a subject and exp > iat".to_string(),
            ));
        }

        encode(&Header::new(Algorithm::HS256), claims, &self.keys(kind).encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Mint a `kind` token for `tracker` issued at `now`, valid for `max_age` seconds
    pub fn mint(
        &self,
        kind: TokenKind,
        tracker: &str,
        max_age: i64,
        now: i64,
    ) -> Result<(String, Claims), TokenError> {
        let claims = Claims::new(&self.issuer, tracker, now, max_age)?;
        let token = self.sign(kind, &claims)?;
        Ok((token, claims))
    }

    /// Verify a token against the current wall clock
    pub fn verify(&self, kind: TokenKind, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(kind, token, chrono::Utc::now().timestamp())
    }

    /// Verify a `kind` token as of `now`
    ///
    /// The HMAC comparison inside `jsonwebtoken` is constant-time.
    ///
    /// # Errors
    /// - `Malformed` if the token cannot be decoded or its claims are inconsistent
    /// - `InvalidSignature` if the signature, algorithm or issuer does not match,
    ///   including a token of the other kind
    /// - `Expired` once `now >= exp`
    pub fn verify_at(&self, kind: TokenKind, token: &str, now: i64) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.keys(kind).decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidIssuer => TokenError::InvalidSignature,
                _ => TokenError::Malformed,
            })?;

        if !claims.is_well_formed() {
            return Err(TokenError::Malformed);
        }

        if claims.is_expired_at(now) {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret-key-at-least-32-characters-long";
    const NOW: i64 = 1_700_000_000;
    const SESSION: TokenKind = TokenKind::Session;

    fn codec() -> TokenCodec {
        TokenCodec::new("http://localhost:8000", SECRET)
    }

    #[test]
    fn test_sign_and_verify_round_trip() {
        let codec = codec();
        let claims = Claims::new(codec.issuer(), "k1lr0y42", NOW, 3600).unwrap();

        for kind in [TokenKind::Refresh, TokenKind::Session] {
            let token = codec.sign(kind, &claims).expect("Failed to sign claims");
            let verified = codec.verify_at(kind, &token, NOW + 10).expect("Failed to verify token");
            assert_eq!(verified, claims);
        }
    }

    #[test]
    fn test_signing_is_deterministic() {
        let codec = codec();
        let claims = Claims::new(codec.issuer(), "k1lr0y42", NOW, 3600).unwrap();

        assert_eq!(codec.sign(SESSION, &claims).unwrap(), codec.sign(SESSION, &claims).unwrap());
    }

    #[test]
    fn test_kinds_do_not_verify_as_each_other() {
        let codec = codec();
        let (refresh, _) = codec.mint(TokenKind::Refresh, "k1lr0y42", 31_536_000, NOW).unwrap();
        let (session, _) = codec.mint(TokenKind::Session, "k1lr0y42", 3600, NOW).unwrap();

        assert_eq!(
            codec.verify_at(TokenKind::Session, &refresh, NOW + 30 * 86_400),
            Err(TokenError::InvalidSignature)
        );
        assert_eq!(
            codec.verify_at(TokenKind::Refresh, &session, NOW),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_wrong_secret_is_invalid_signature() {
        let codec = codec();
        let other = TokenCodec::new("http://localhost:8000", b"another-secret-key-that-is-32-bytes!!");
        let (token, _) = codec.mint(SESSION, "k1lr0y42", 3600, NOW).unwrap();

        assert_eq!(other.verify_at(SESSION, &token, NOW), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_wrong_issuer_is_rejected() {
        let codec = codec();
        let foreign = TokenCodec::new("https://elsewhere.example", SECRET);
        let (token, _) = foreign.mint(SESSION, "k1lr0y42", 3600, NOW).unwrap();

        assert_eq!(codec.verify_at(SESSION, &token, NOW), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_expires_exactly_at_exp() {
        let codec = codec();
        let (token, claims) = codec.mint(SESSION, "k1lr0y42", 60, NOW).unwrap();

        assert!(codec.verify_at(SESSION, &token, claims.exp - 1).is_ok());
        assert_eq!(codec.verify_at(SESSION, &token, claims.exp), Err(TokenError::Expired));
        assert_eq!(codec.verify_at(SESSION, &token, claims.exp + 3600), Err(TokenError::Expired));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let codec = codec();

        assert_eq!(codec.verify_at(SESSION, "invalid.token.here", NOW), Err(TokenError::Malformed));
        assert_eq!(codec.verify_at(SESSION, "", NOW), Err(TokenError::Malformed));
    }

    #[test]
    fn test_tampered_token() {
        let codec = codec();
        let (token, _) = codec.mint(SESSION, "k1lr0y42", 3600, NOW).unwrap();

        let tampered = format!("{}X", token);
        assert!(codec.verify_at(SESSION, &tampered, NOW).is_err());
    }

    #[test]
    fn test_sign_rejects_malformed_claims() {
        let codec = codec();
        let backwards = Claims {
            iss: codec.issuer().to_string(),
            sub: "k1lr0y42".to_string(),
            iat: NOW,
            exp: NOW - 1,
        };

        assert!(matches!(codec.sign(SESSION, &backwards), Err(TokenError::Encoding(_))));
        assert!(matches!(codec.mint(SESSION, "", 60, NOW), Err(TokenError::Encoding(_))));
    }

    #[test]
    fn test_mint_with_overflowing_lifetime_fails_cleanly() {
        let codec = codec();

        assert!(matches!(
            codec.mint(TokenKind::Refresh, "k1lr0y42", i64::MAX, NOW),
            Err(TokenError::Encoding(_))
        ));
    }
}
