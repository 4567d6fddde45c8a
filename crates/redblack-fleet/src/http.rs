//! Minimal HTTP/1.1 client for the fleet control service.
//!
//! One TCP connection per request, bounded by a per-request timeout.
//! Redirects are not followed: the fleet service answers mutations with
//! a redirect whose `Location` is the task handle.

use std::time::Duration;

use bytes::Bytes;
use http::{header, Method, Request, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::form_urlencoded;
use url::Url;

use crate::error::{FleetError, FleetResult};

/// A fully-read HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub url: Url,
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: Bytes,
}

impl HttpResponse {
    /// Fail unless the status is 2xx or 3xx.
    pub fn error_for_status(self) -> FleetResult<Self> {
        if self.status.is_success() || self.status.is_redirection() {
            Ok(self)
        } else {
            Err(FleetError::Status {
                url: self.url.into(),
                status: self.status.as_u16(),
            })
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> FleetResult<T> {
        serde_json::from_slice(&self.body).map_err(|e| FleetError::decode(self.url.as_str(), e))
    }
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    timeout: Duration,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn get(&self, url: &Url) -> FleetResult<HttpResponse> {
        self.send(Method::GET, url, None).await
    }

    /// POST `fields` as an `application/x-www-form-urlencoded` body.
    pub async fn post_form(&self, url: &Url, fields: &[(&str, &str)]) -> FleetResult<HttpResponse> {
        let body = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        self.send(Method::POST, url, Some(Bytes::from(body))).await
    }

    async fn send(&self, method: Method, url: &Url, body: Option<Bytes>) -> FleetResult<HttpResponse> {
        let invalid = |reason: &str| FleetError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };
        if url.scheme() != "http" {
            return Err(invalid("only http:// endpoints are supported"));
        }
        let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
        let port = url.port_or_known_default().unwrap_or(80);
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let address = format!("{host}:{port}");

        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }
        let path: Uri = path.parse().map_err(|e| FleetError::InvalidUrl {
            url: url.to_string(),
            reason: format!("{e}"),
        })?;

        let mut builder = Request::builder()
            .method(method.clone())
            .uri(path)
            .header(header::HOST, authority)
            .header(header::USER_AGENT, "redblack/0.1")
            .header(header::ACCEPT, "application/json");
        if body.is_some() {
            builder = builder.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        }
        let request = builder
            .body(Full::new(body.unwrap_or_default()))
            .map_err(|e| FleetError::transport(url.as_str(), e))?;

        let exchange = async {
            let stream = tokio::net::TcpStream::connect(&address)
                .await
                .map_err(|e| FleetError::transport(url.as_str(), e))?;

            let io = TokioIo::new(stream);
            let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
                .await
                .map_err(|e| FleetError::transport(url.as_str(), e))?;

            // Drive the connection in the background.
            tokio::spawn(async move {
                let _ = conn.await;
            });

            let response = sender
                .send_request(request)
                .await
                .map_err(|e| FleetError::transport(url.as_str(), e))?;

            let status = response.status();
            let location = response
                .headers()
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| FleetError::transport(url.as_str(), e))?
                .to_bytes();

            Ok::<_, FleetError>(HttpResponse {
                url: url.clone(),
                status,
                location,
                body,
            })
        };

        let response = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| FleetError::RequestTimeout {
                url: url.to_string(),
                secs: self.timeout.as_secs(),
            })??;

        debug!(%method, %url, status = %response.status, "fleet request");
        Ok(response)
    }
}

/// Parse an absolute URL from configuration or a response body.
pub fn parse_url(raw: &str) -> FleetResult<Url> {
    let url = Url::parse(raw).map_err(|e| FleetError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(FleetError::InvalidUrl {
            url: raw.to_string(),
            reason: "not a hierarchical url".to_string(),
        });
    }
    Ok(url)
}

/// Resolve a `Location` header against the URL that produced it.
pub fn resolve_location(request_url: &Url, location: &str) -> FleetResult<Url> {
    request_url
        .join(location)
        .map_err(|e| FleetError::InvalidUrl {
            url: location.to_string(),
            reason: e.to_string(),
        })
}
