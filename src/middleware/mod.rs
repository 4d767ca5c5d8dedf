/// Middleware module
///
/// Cookie session association and double-submit mutation checks.

mod mutation_middleware;
mod session_middleware;

pub use mutation_middleware::MutationMiddleware;
pub use session_middleware::SessionMiddleware;
