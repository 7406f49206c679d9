//! HTTP transport seam.
//!
//! Every request the client makes is described by a [`PortalRequest`] and
//! executed by a [`Transport`]. [`HttpTransport`] sends it with reqwest;
//! tests substitute an in-memory implementation.

use async_trait::async_trait;

use crate::{PortalConfig, PortalError};

/// HTTP method and payload of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// Plain `GET`.
    Get,
    /// `POST` with an `application/x-www-form-urlencoded` body.
    PostForm(Vec<(String, String)>),
}

/// A request to the portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalRequest {
    /// Absolute URL.
    pub url: String,
    /// Method and body.
    pub method: Method,
    /// Extra headers, sent in order.
    pub headers: Vec<(String, String)>,
}

impl PortalRequest {
    /// Builds a `GET` request.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::Get,
            headers: Vec::new(),
        }
    }

    /// Builds a form `POST` request.
    #[must_use]
    pub fn post_form(url: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self {
            url: url.into(),
            method: Method::PostForm(form),
            headers: Vec::new(),
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_owned(), value.to_owned()));
        self
    }

    /// Returns the value of the first header named `key` (case-insensitive).
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    const fn method_name(&self) -> &'static str {
        match self.method {
            Method::Get => "GET",
            Method::PostForm(_) => "POST",
        }
    }

    /// Returns the value of form field `name`, if this is a form `POST`.
    #[must_use]
    pub fn form_value(&self, name: &str) -> Option<&str> {
        match &self.method {
            Method::PostForm(form) => form
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            Method::Get => None,
        }
    }
}

/// A successful (2xx) response from the portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalResponse {
    /// Final URL after redirects.
    pub url: String,
    /// Status code.
    pub status: u16,
    /// Raw `Set-Cookie` header values.
    pub set_cookies: Vec<String>,
    /// Response body.
    pub body: String,
}

impl PortalResponse {
    /// Builds a `200 OK` response without cookies.
    #[must_use]
    pub fn ok(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: 200,
            set_cookies: Vec::new(),
            body: body.into(),
        }
    }

    /// Adds a raw `Set-Cookie` header value.
    #[must_use]
    pub fn with_set_cookie(mut self, header: &str) -> Self {
        self.set_cookies.push(header.to_owned());
        self
    }

    /// Returns the value of cookie `name` set by this response.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.set_cookies.iter().find_map(|header| {
            let pair = header.split(';').next()?;
            let (key, value) = pair.split_once('=')?;
            (key.trim() == name).then(|| value.trim())
        })
    }
}

/// Executes requests against the portal.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` and returns the response.
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::Timeout`] if the request timed out,
    /// [`PortalError::Status`] for a non-2xx answer, and
    /// [`PortalError::Transport`] for any other network failure.
    async fn execute(&self, request: &PortalRequest) -> Result<PortalResponse, PortalError>;
}

/// [`Transport`] backed by a [`reqwest::Client`].
///
/// No cookie store is kept: the session cookie is forwarded explicitly by
/// the requests that need it.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Builds a client with the configured timeout and user agent.
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::Transport`] if the client cannot be built.
    pub fn new(config: &PortalConfig) -> Result<Self, PortalError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn classify(url: &str, e: reqwest::Error) -> PortalError {
    if e.is_timeout() {
        PortalError::Timeout {
            url: url.to_owned(),
        }
    } else {
        PortalError::Transport(e)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &PortalRequest) -> Result<PortalResponse, PortalError> {
        let mut builder = match &request.method {
            Method::Get => self.client.get(&request.url),
            Method::PostForm(form) => self.client.post(&request.url).form(form),
        };
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        log::debug!("{} {}", request.method_name(), request.url);

        let response = builder
            .send()
            .await
            .map_err(|e| classify(&request.url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PortalError::Status {
                status: status.as_u16(),
                url: request.url.clone(),
            });
        }

        let url = response.url().to_string();
        let set_cookies = response
            .headers()
            .get_all(reqwest::header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_owned)
            .collect();

        let body = response
            .text()
            .await
            .map_err(|e| classify(&request.url, e))?;

        Ok(PortalResponse {
            url,
            status: status.as_u16(),
            set_cookies,
            body,
        })
    }
}
