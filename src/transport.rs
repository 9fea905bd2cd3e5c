use crate::config::ClientConfig;
use crate::errors::ClientError;
use crate::models::CsrfPair;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, COOKIE},
    Client, Url,
};
use std::future::Future;
use tracing::debug;

pub const AJAX_HEADER: &str = "X-Requested-With";
pub const AJAX_VALUE: &str = "XMLHttpRequest";

/// A state-changing request: path relative to the server root, anti-forgery
/// pair and a url-encoded form body (possibly empty).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRequest {
    pub path: String,
    pub csrf: Option<CsrfPair>,
    pub form: Vec<(String, String)>,
}

impl PostRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            csrf: None,
            form: Vec::new(),
        }
    }

    pub fn with_csrf(mut self, csrf: CsrfPair) -> Self {
        if !csrf.is_empty() {
            self.csrf = Some(csrf);
        }
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((name.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turns a non-2xx response into an error, keeping the body otherwise.
    pub fn into_success(self) -> Result<String, ClientError> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(ClientError::status(self.status))
        }
    }
}

/// The network seam. Every component talks to the server through this trait.
pub trait Transport: Send + Sync {
    fn post(&self, request: PostRequest) -> impl Future<Output = Result<HttpResponse, ClientError>> + Send;

    /// A fragment fetch carrying the AJAX marker header.
    fn get(&self, url: &Url) -> impl Future<Output = Result<HttpResponse, ClientError>> + Send;
}

pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = &config.session_cookie {
            let value = HeaderValue::from_str(cookie).map_err(|err| ClientError::config(err.to_string()))?;
            headers.insert(COOKIE, value);
        }

        let client = Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    /// Fetches a full page without the AJAX marker, the way a browser navigation would.
    pub async fn load_page(&self, path: &str) -> Result<String, ClientError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|err| ClientError::invalid_url(path, err))?;
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        HttpResponse { status, body }.into_success()
    }
}

impl Transport for HttpTransport {
    async fn post(&self, request: PostRequest) -> Result<HttpResponse, ClientError> {
        let url = self
            .base_url
            .join(&request.path)
            .map_err(|err| ClientError::invalid_url(&request.path, err))?;

        let mut builder = self.client.post(url).form(&request.form);
        if let Some(csrf) = &request.csrf {
            let name = HeaderName::from_bytes(csrf.header.as_bytes())
                .map_err(|err| ClientError::usage(format!("invalid csrf header '{}': {err}", csrf.header)))?;
            let value = HeaderValue::from_str(&csrf.token)
                .map_err(|err| ClientError::usage(format!("invalid csrf token: {err}")))?;
            builder = builder.header(name, value);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(path = %request.path, status, "post completed");
        Ok(HttpResponse { status, body })
    }

    async fn get(&self, url: &Url) -> Result<HttpResponse, ClientError> {
        let response = self
            .client
            .get(url.clone())
            .header(AJAX_HEADER, AJAX_VALUE)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(%url, status, "fragment fetched");
        Ok(HttpResponse { status, body })
    }
}
