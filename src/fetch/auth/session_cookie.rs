use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue, SET_COOKIE};
use tracing::warn;

/// An [`HttpClient`] wrapper that replays the session cookies handed out by a
/// login response on every request it forwards.
///
/// The gateway keeps the session server side and only identifies it through
/// the `sid` cookie, so nothing else needs to be carried between requests.
pub struct SessionCookie<C> {
    pub inner: C,
    cookie: Option<HeaderValue>,
}

impl<C> SessionCookie<C> {
    /// Builds the wrapper from the headers of a login response. Only the
    /// `name=value` part of each `Set-Cookie` is kept; attributes are dropped.
    pub fn from_login_headers(inner: C, headers: &HeaderMap) -> Self {
        let pairs: Vec<&str> = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| value.split(';').next())
            .map(str::trim)
            .filter(|pair| pair.contains('='))
            .collect();

        let cookie = if pairs.is_empty() {
            None
        } else {
            match HeaderValue::from_str(&pairs.join("; ")) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(error = %e, "Login cookies are not a valid header value, dropping them");
                    None
                }
            }
        };

        Self { inner, cookie }
    }

    pub fn has_cookie(&self) -> bool {
        self.cookie.is_some()
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for SessionCookie<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        if let Some(cookie) = &self.cookie {
            req.headers_mut().insert(COOKIE, cookie.clone());
        }
        self.inner.execute(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_only_name_value_pairs() {
        let mut headers = HeaderMap::new();
        headers.append(
            SET_COOKIE,
            HeaderValue::from_static("sid=abc123; Path=/; HttpOnly"),
        );
        headers.append(SET_COOKIE, HeaderValue::from_static("lsid=xyz; Path=/"));

        let session = SessionCookie::from_login_headers((), &headers);

        assert_eq!(
            session.cookie.as_ref().and_then(|v| v.to_str().ok()),
            Some("sid=abc123; lsid=xyz")
        );
    }

    #[test]
    fn test_no_set_cookie_means_no_cookie() {
        let session = SessionCookie::from_login_headers((), &HeaderMap::new());
        assert!(!session.has_cookie());
    }
}
