// Identity gate: OAuth 2.0 + PKCE sign-in and HS256 session tokens.
// Produces the `Subject` every /api route consumes.

pub mod handlers;
pub mod middleware;
pub mod pkce;
pub mod provider;
pub mod session;
pub mod users;
