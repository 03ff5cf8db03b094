//! OAuth 1.0a signed HTTP session for the Telldus Live API.
//!
//! Telldus Live authenticates API calls with pre-issued OAuth 1.0a consumer
//! and access tokens. Every request carries an `Authorization: OAuth ...`
//! header signed with HMAC-SHA1 over the method, URL and all parameters.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use telldus_core::{Credentials, OAuthSession, TelldusSession};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let credentials = Credentials::new("client-key", "client-secret", "token", "token-secret");
//! let timeout = Duration::from_secs(30);
//! let session = OAuthSession::new(telldus_core::DEFAULT_BASE_URL, credentials, timeout)?;
//!
//! let response = session.get("sensors/list", &[]).await?;
//! println!("HTTP {}", response.status);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use rand::Rng;
use rand::distr::Alphanumeric;
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use sha1::Sha1;
use time::OffsetDateTime;
use tracing::debug;

use crate::error::RemoteFetchError;
use crate::session::{ApiResponse, TelldusSession};

/// Root of the Telldus Live JSON API.
pub const DEFAULT_BASE_URL: &str = "https://api.telldus.com/json";

/// Characters left unescaped by RFC 3986 (`ALPHA / DIGIT / "-" / "." / "_" / "~"`).
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const OAUTH_VERSION: &str = "1.0";

/// OAuth 1.0a consumer and access credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_key: String,
    pub client_secret: String,
    pub resource_owner_key: String,
    pub resource_owner_secret: String,
}

impl Credentials {
    pub fn new(
        client_key: impl Into<String>,
        client_secret: impl Into<String>,
        resource_owner_key: impl Into<String>,
        resource_owner_secret: impl Into<String>,
    ) -> Self {
        Self {
            client_key: client_key.into(),
            client_secret: client_secret.into(),
            resource_owner_key: resource_owner_key.into(),
            resource_owner_secret: resource_owner_secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_key", &self.client_key)
            .field("client_secret", &"<redacted>")
            .field("resource_owner_key", &self.resource_owner_key)
            .field("resource_owner_secret", &"<redacted>")
            .finish()
    }
}

/// A [`TelldusSession`] that signs requests with OAuth 1.0a.
#[derive(Debug, Clone)]
pub struct OAuthSession {
    client: Client,
    base_url: String,
    credentials: Credentials,
}

impl OAuthSession {
    /// Create a session against `base_url` with a per-request timeout.
    pub fn new(
        base_url: &str,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, RemoteFetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteFetchError::Transport {
                endpoint: base_url.to_string(),
                message: e.to_string(),
            })?;
        Self::with_client(base_url, credentials, client)
    }

    /// Create a session with a custom reqwest Client.
    pub fn with_client(
        base_url: &str,
        credentials: Credentials,
        client: Client,
    ) -> Result<Self, RemoteFetchError> {
        let base_url = base_url.trim_end_matches('/').to_string();

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(RemoteFetchError::Transport {
                endpoint: base_url.clone(),
                message: format!("URL must start with http:// or https://, got: {base_url}"),
            });
        }

        Ok(Self {
            client,
            base_url,
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }
}

#[async_trait]
impl TelldusSession for OAuthSession {
    async fn get(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<ApiResponse, RemoteFetchError> {
        let url = self.url(endpoint);
        let header = authorization_header(
            "GET",
            &url,
            params,
            &self.credentials,
            &nonce(),
            OffsetDateTime::now_utc().unix_timestamp(),
        )?;

        debug!("GET {} {:?}", url, params);

        let transport = |e: reqwest::Error| RemoteFetchError::Transport {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        };

        let response = self
            .client
            .get(&url)
            .query(params)
            .header(AUTHORIZATION, header)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport)?;

        Ok(ApiResponse::new(endpoint, status, body))
    }
}

fn encode(s: &str) -> String {
    utf8_percent_encode(s, UNRESERVED).to_string()
}

fn nonce() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// The `oauth_*` protocol parameters for one request (without the signature).
fn protocol_params(
    credentials: &Credentials,
    nonce: &str,
    timestamp: i64,
) -> Vec<(String, String)> {
    vec![
        ("oauth_consumer_key".to_string(), credentials.client_key.clone()),
        ("oauth_nonce".to_string(), nonce.to_string()),
        ("oauth_signature_method".to_string(), SIGNATURE_METHOD.to_string()),
        ("oauth_timestamp".to_string(), timestamp.to_string()),
        ("oauth_token".to_string(), credentials.resource_owner_key.clone()),
        ("oauth_version".to_string(), OAUTH_VERSION.to_string()),
    ]
}

/// Build the signature base string (RFC 5849 section 3.4.1).
///
/// `params` must contain both the request parameters and the protocol
/// parameters, unencoded.
pub(crate) fn signature_base_string(
    method: &str,
    url: &str,
    params: &[(String, String)],
) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (encode(k), encode(v)))
        .collect();
    encoded.sort();

    let normalized = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        encode(url),
        encode(&normalized)
    )
}

/// HMAC-SHA1 signature of `base`, base64 encoded.
pub(crate) fn sign(
    base: &str,
    consumer_secret: &str,
    token_secret: &str,
) -> Result<String, RemoteFetchError> {
    let key = format!("{}&{}", encode(consumer_secret), encode(token_secret));
    let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())
        .map_err(|e| RemoteFetchError::Signing(e.to_string()))?;
    mac.update(base.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Build the `Authorization` header value for one request.
pub(crate) fn authorization_header(
    method: &str,
    url: &str,
    params: &[(&str, String)],
    credentials: &Credentials,
    nonce: &str,
    timestamp: i64,
) -> Result<String, RemoteFetchError> {
    let mut oauth = protocol_params(credentials, nonce, timestamp);

    let mut all: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    all.extend(oauth.iter().cloned());

    let base = signature_base_string(method, url, &all);
    let signature = sign(
        &base,
        &credentials.client_secret,
        &credentials.resource_owner_secret,
    )?;
    oauth.push(("oauth_signature".to_string(), signature));
    oauth.sort();

    let fields = oauth
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join(", ");

    Ok(format!("OAuth {fields}"))
}
