//! Request decorators that carry gateway credentials.

mod session_cookie;

pub use session_cookie::SessionCookie;
