/// Authentication module
///
/// The dual-token session protocol: token signing and verification, the
/// refresh policy, the session (association) filter, the double-submit
/// mutation guard, and subscription handshake authentication.

mod claims;
mod jwt;
mod mutation;
mod policy;
mod session;
mod subscription;
mod tracker;

pub use claims::Claims;
pub use jwt::{TokenCodec, TokenKind};
pub use mutation::{bearer_token, MutationGuard};
pub use policy::{RefreshPolicy, RenewReason, Renewal};
pub use session::{
    Association, CookieInstruction, SessionContext, SessionFilter, REFRESH_COOKIE, SESSION_COOKIE,
};
pub use subscription::{SubscriptionAuthenticator, SubscriptionContext};
pub use tracker::generate_tracker;
