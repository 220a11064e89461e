use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::cancel::CancellationToken;

/// Exchanges credentials for a token pair.
pub const LOGIN_PATH: &str = "/auth/login";
/// Exchanges a refresh token for a new access token.
pub const REFRESH_PATH: &str = "/auth/token/refresh";
/// Validates the current access token.
pub const VERIFY_PATH: &str = "/auth/token/verify";

/// The methods the backend exposes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl From<HttpMethod> for http::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => http::Method::GET,
            HttpMethod::Post => http::Method::POST,
            HttpMethod::Put => http::Method::PUT,
            HttpMethod::Delete => http::Method::DELETE,
        }
    }
}

/// How a path is treated when the backend answers 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Refresh,
    Verify,
    Business,
}

impl Route {
    /// Classifies a request path. Bootstrap endpoints match exactly, ignoring
    /// a trailing slash and any query string.
    pub fn of(path: &str) -> Self {
        let path = path.split('?').next().unwrap_or(path);
        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };
        match path {
            LOGIN_PATH => Route::Login,
            REFRESH_PATH => Route::Refresh,
            VERIFY_PATH => Route::Verify,
            _ => Route::Business,
        }
    }

    pub fn is_bootstrap(&self) -> bool {
        !matches!(self, Route::Business)
    }
}

/// Per-call knobs shared by the method wrappers.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub query: BTreeMap<String, String>,
    pub headers: Vec<(String, String)>,
    pub cancel: Option<CancellationToken>,
}

impl RequestOptions {
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// One outbound call, built by a caller and consumed by the client.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: HttpMethod,
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
    pub cancel: Option<CancellationToken>,
}

impl RequestDescriptor {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        RequestDescriptor {
            method,
            path: path.into(),
            query: BTreeMap::new(),
            body: None,
            headers: Vec::new(),
            cancel: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.query.extend(options.query);
        self.headers.extend(options.headers);
        if options.cancel.is_some() {
            self.cancel = options.cancel;
        }
        self
    }

    pub fn route(&self) -> Route {
        Route::of(&self.path)
    }
}
