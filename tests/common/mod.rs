//! Scripted [`HttpClient`] used by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use gateway_speed_log::fetch::HttpClient;
use reqwest::header::COOKIE;
use reqwest::{Method, Request, Response};

#[derive(Clone)]
pub enum Reply {
    Respond {
        status: u16,
        body: String,
        set_cookie: Option<String>,
    },
    /// Never answers; used to trip timeouts.
    Hang,
}

impl Reply {
    pub fn ok(body: impl Into<String>) -> Self {
        Reply::Respond {
            status: 200,
            body: body.into(),
            set_cookie: None,
        }
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Reply::Respond {
            status,
            body: body.into(),
            set_cookie: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub cookie: Option<String>,
    pub body: Option<Vec<u8>>,
}

/// Answers requests by URL path. Unknown paths get a 404.
#[derive(Default)]
pub struct ScriptedClient {
    routes: Mutex<HashMap<String, Reply>>,
    requests: Mutex<Vec<Recorded>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, path: &str, reply: Reply) -> Self {
        self.routes.lock().unwrap().insert(path.to_string(), reply);
        self
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }
}

#[async_trait]
impl HttpClient for ScriptedClient {
    async fn execute(&self, req: Request) -> reqwest::Result<Response> {
        let path = req.url().path().to_string();
        self.requests.lock().unwrap().push(Recorded {
            method: req.method().clone(),
            path: path.clone(),
            cookie: req
                .headers()
                .get(COOKIE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body: req.body().and_then(|b| b.as_bytes()).map(<[u8]>::to_vec),
        });

        let reply = self
            .routes
            .lock()
            .unwrap()
            .get(&path)
            .cloned()
            .unwrap_or_else(|| Reply::status(404, "not found"));

        match reply {
            Reply::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            Reply::Respond {
                status,
                body,
                set_cookie,
            } => {
                let mut builder = http::Response::builder().status(status);
                if let Some(cookie) = set_cookie {
                    builder = builder.header("set-cookie", cookie);
                }
                Ok(Response::from(builder.body(body).unwrap()))
            }
        }
    }
}
