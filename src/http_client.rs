//! HTTP client abstraction for the session layer
//!
//! This module provides a clean interface for making HTTP requests,
//! which can be easily mocked for testing. An `Err` from [`HttpClient::request`]
//! always means that no response was received; every HTTP status, including
//! 4xx and 5xx, comes back as an `Ok(SimpleHttpResponse)`. Callers hand in
//! header values that are already valid.

use std::collections::HashMap;
use std::fmt::Debug;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};
use serde::de::DeserializeOwned;

/// Simple HTTP response structure for standardized response handling
#[derive(Debug, Clone)]
pub struct SimpleHttpResponse {
    /// HTTP status code
    status: StatusCode,
    /// Response headers
    headers: HeaderMap,
    /// Response body as text
    body: String,
}

impl SimpleHttpResponse {
    /// Create a new response
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Add a header, ignoring names or values that are not valid HTTP
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (HeaderName::from_str(key), HeaderValue::from_str(value)) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Get the status code
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get the response headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a reference to the response body
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Parse the response body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Check if the response is successful (status code 200-299)
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// HTTP client trait for abstracting HTTP requests
#[async_trait]
pub trait HttpClient: Send + Sync + Debug {
    /// Send an HTTP request with the specified method, URL, headers, and body
    async fn request(
        &self,
        method: Method,
        url: &str,
        headers: HashMap<String, String>,
        body: Option<String>,
    ) -> Result<SimpleHttpResponse>;

    /// Send a GET request
    async fn get(&self, url: &str, headers: HashMap<String, String>) -> Result<SimpleHttpResponse> {
        self.request(Method::GET, url, headers, None).await
    }

    /// Send a POST request
    async fn post(
        &self,
        url: &str,
        headers: HashMap<String, String>,
        body: String,
    ) -> Result<SimpleHttpResponse> {
        self.request(Method::POST, url, headers, Some(body)).await
    }
}

/// Implementation of HttpClient using reqwest
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Create a client whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("erp-client/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Create a new client with custom configuration
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn request(
        &self,
        method: Method,
        url: &str,
        headers: HashMap<String, String>,
        body: Option<String>,
    ) -> Result<SimpleHttpResponse> {
        let mut header_map = HeaderMap::new();
        for (key, value) in headers {
            header_map.insert(HeaderName::from_str(&key)?, HeaderValue::from_str(&value)?);
        }

        let mut request_builder = self.client.request(method, url).headers(header_map);
        if let Some(body) = body {
            request_builder = request_builder.body(body);
        }

        let response = request_builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        Ok(SimpleHttpResponse {
            status,
            headers,
            body,
        })
    }
}
