//! HTTP plumbing shared by the gateway client and the speed test provider.

mod basic;
mod client;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;

use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Method, Request, Url};

/// A bare GET request for `url`.
pub fn get_request(url: Url) -> Request {
    Request::new(Method::GET, url)
}

/// A POST request carrying `fields` as an `application/x-www-form-urlencoded` body.
pub fn form_request(url: Url, fields: &[(&str, &str)]) -> Request {
    // Url already knows how to urlencode pairs; borrow its serializer.
    let mut scratch = url.clone();
    scratch.set_query(None);
    scratch.query_pairs_mut().extend_pairs(fields);
    let body = scratch.query().unwrap_or_default().to_owned();

    let mut req = Request::new(Method::POST, url);
    req.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/x-www-form-urlencoded"),
    );
    *req.body_mut() = Some(body.into());
    req
}

/// GETs `url` and returns the body, failing on a non-success status.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: Url) -> reqwest::Result<Vec<u8>> {
    let resp = client.execute(get_request(url)).await?.error_for_status()?;
    Ok(resp.bytes().await?.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_request_encodes_fields() {
        let url = Url::parse("http://192.168.12.1/login_app.cgi").unwrap();
        let req = form_request(url, &[("name", "admin"), ("pswd", "p&ss word")]);

        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.url().as_str(), "http://192.168.12.1/login_app.cgi");
        assert_eq!(
            req.headers().get(CONTENT_TYPE).unwrap(),
            "application/x-www-form-urlencoded"
        );
        let body = req.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(body, b"name=admin&pswd=p%26ss+word");
    }

    #[test]
    fn test_get_request_has_no_body() {
        let url = Url::parse("http://192.168.12.1/cell_status_app.cgi").unwrap();
        let req = get_request(url);
        assert_eq!(req.method(), Method::GET);
        assert!(req.body().is_none());
    }
}
