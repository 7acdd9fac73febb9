//! Request authentication.
//!
//! Access tokens are verified statelessly on every protected request; only
//! the refresh endpoint touches the token store. A token may arrive in the
//! `accessToken` cookie or as a bearer header, in that order.

mod cookie;
mod errors;
mod extractors;
mod ip;
mod state;
mod token_source;
mod types;

pub use cookie::{
    ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, clear_cookie, get_cookie, session_cookie,
};
pub use errors::AuthError;
pub use extractors::{Auth, OptionalAuth, authenticate};
pub use ip::{ClientIpHeader, HasHeadersAndExtensions, extract_client_ip};
pub use state::HasAuthBackend;
pub use token_source::{
    ACCESS_TOKEN_SOURCES, REFRESH_TOKEN_SOURCES, TokenSource, access_cookie, bearer_header,
    extract_token, refresh_cookie,
};
pub use types::AuthenticatedUser;
