/// Session Association and Refresh
///
/// The GET-safe entry filter. Every request presents (at most) a refresh token
/// and a session token as cookies; the filter works out which tracker the
/// agent is, which member that tracker belongs to, and which cookies (if any)
/// must be rewritten. It is transport-agnostic: the result is an
/// `Association` that the HTTP binding applies to the response.

use std::sync::Arc;

use crate::auth::claims::Claims;
use crate::auth::jwt::{TokenCodec, TokenKind};
use crate::auth::policy::{RefreshPolicy, Renewal};
use crate::configuration::SessionSettings;
use crate::error::AppError;
use crate::identity::{Member, TrackerResolver};

pub const REFRESH_COOKIE: &str = "refresh.jwt";
pub const SESSION_COOKIE: &str = "session.jwt";

/// A cookie the transport must set on the response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieInstruction {
    pub name: &'static str,
    pub value: String,
    /// `None` for a browser-session cookie
    pub max_age: Option<i64>,
    pub http_only: bool,
    pub secure: bool,
}

/// The identity attached to a request by the session filter
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub tracker: String,
    pub member: Member,
    /// Claims of the session token in force after this request
    pub claims: Claims,
    /// The session cookie the agent presented, kept only if it verified and
    /// names `tracker`. This is the cookie half of the double-submit check.
    pub presented_token: Option<String>,
    /// Whether tokens were re-minted on this request
    pub renewed: bool,
}

#[derive(Debug, Clone)]
pub struct Association {
    pub context: SessionContext,
    pub cookies: Vec<CookieInstruction>,
}

struct Presented<'a> {
    token: &'a str,
    claims: Claims,
}

pub struct SessionFilter {
    codec: Arc<TokenCodec>,
    policy: RefreshPolicy,
    resolver: Arc<dyn TrackerResolver>,
    cookie_secure: bool,
}

impl SessionFilter {
    pub fn new(
        codec: Arc<TokenCodec>,
        policy: RefreshPolicy,
        resolver: Arc<dyn TrackerResolver>,
        cookie_secure: bool,
    ) -> Self {
        Self {
            codec,
            policy,
            resolver,
            cookie_secure,
        }
    }

    pub fn from_settings(
        settings: &SessionSettings,
        codec: Arc<TokenCodec>,
        resolver: Arc<dyn TrackerResolver>,
    ) -> Self {
        Self::new(
            codec,
            RefreshPolicy::from_settings(settings),
            resolver,
            settings.cookie_secure,
        )
    }

    pub fn resolver(&self) -> &Arc<dyn TrackerResolver> {
        &self.resolver
    }

    pub async fn associate(
        &self,
        refresh_cookie: Option<&str>,
        session_cookie: Option<&str>,
    ) -> Result<Association, AppError> {
        self.associate_at(refresh_cookie, session_cookie, chrono::Utc::now().timestamp())
            .await
    }

    /// Associate a request with an identity as of `now`
    ///
    /// # Errors
    /// Identity store failures and token encoding failures. Bad cookies are
    /// never an error: they are treated as absent.
    pub async fn associate_at(
        &self,
        refresh_cookie: Option<&str>,
        session_cookie: Option<&str>,
        now: i64,
    ) -> Result<Association, AppError> {
        let refresh =
            refresh_cookie.and_then(|token| self.verified(TokenKind::Refresh, token, now));
        let presented = session_cookie.and_then(|token| {
            self.verified(TokenKind::Session, token, now)
                .map(|claims| Presented { token, claims })
        });

        let decision = self
            .policy
            .decide(refresh.as_ref(), presented.as_ref().map(|p| &p.claims), now);

        match decision {
            Renewal::Fresh(claims) => {
                let Some(presented) = presented else {
                    return Err(AppError::Internal(
                        "fresh session without a presented token".to_string(),
                    ));
                };
                if let Some(member) = self.resolver.last_known(&claims.sub) {
                    return Ok(Self::unchanged(member, presented));
                }

                // Nothing cached for this tracker (e.g. after a restart)
                let resolved = self.resolver.refresh_sub(Some(&claims.sub)).await?;
                if resolved.0 == claims.sub {
                    return Ok(Self::unchanged(resolved.1, presented));
                }
                self.renew(Some(&claims.sub), true, resolved, Some(presented), now)
            }
            Renewal::Renew {
                prior_sub,
                refresh_valid,
                reason,
            } => {
                tracing::debug!(
                    reason = reason.as_str(),
                    prior = ?prior_sub,
                    "Renewing session"
                );
                let resolved = self.resolver.refresh_sub(prior_sub.as_deref()).await?;
                self.renew(prior_sub.as_deref(), refresh_valid, resolved, presented, now)
            }
        }
    }

    fn verified(&self, kind: TokenKind, token: &str, now: i64) -> Option<Claims> {
        match self.codec.verify_at(kind, token, now) {
            Ok(claims) => Some(claims),
            Err(e) => {
                tracing::debug!(kind = kind.as_str(), error = %e, "Ignoring presented token");
                None
            }
        }
    }

    fn unchanged(member: Member, presented: Presented<'_>) -> Association {
        Association {
            context: SessionContext {
                tracker: presented.claims.sub.clone(),
                member,
                claims: presented.claims,
                presented_token: Some(presented.token.to_string()),
                renewed: false,
            },
            cookies: Vec::new(),
        }
    }

    fn renew(
        &self,
        prior_sub: Option<&str>,
        refresh_valid: bool,
        (tracker, member): (String, Member),
        presented: Option<Presented<'_>>,
        now: i64,
    ) -> Result<Association, AppError> {
        let mut cookies = Vec::with_capacity(2);

        if RefreshPolicy::needs_refresh_token(refresh_valid, prior_sub, &tracker) {
            let (token, _) = self
                .codec
                .mint(TokenKind::Refresh, &tracker, self.policy.refresh_max_age, now)?;
            cookies.push(CookieInstruction {
                name: REFRESH_COOKIE,
                value: token,
                max_age: Some(self.policy.refresh_max_age),
                http_only: true,
                secure: self.cookie_secure,
            });
        }

        let (token, claims) = self
            .codec
            .mint(TokenKind::Session, &tracker, self.policy.session_max_age, now)?;
        // Same-origin script must read this cookie to echo it in the header
        cookies.push(CookieInstruction {
            name: SESSION_COOKIE,
            value: token,
            max_age: None,
            http_only: false,
            secure: self.cookie_secure,
        });

        let presented_token = presented
            .filter(|p| p.claims.sub == tracker)
            .map(|p| p.token.to_string());

        tracing::info!(
            tracker = %tracker,
            refresh_rotated = cookies.len() == 2,
            "Session tokens minted"
        );

        Ok(Association {
            context: SessionContext {
                tracker,
                member,
                claims,
                presented_token,
                renewed: true,
            },
            cookies,
        })
    }
}
