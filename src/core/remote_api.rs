/*
 * The HTTP boundary to the task-management API. Two narrow traits describe what
 * the rest of the client needs from the server:
 *
 * - `RemoteFetchOperations` fetches the raw JSON of a cached resource
 *   (`/api/reports`).
 * - `IdentityResolverOperations` turns a persisted token back into a user id and
 *   role during hydration (`/api/auth/me`).
 *
 * `HttpApiClient` implements both on a blocking `reqwest` client. The calls only
 * ever run on the host's worker threads, never on the event loop.
 */
use crate::core::config::AppConfig;
use crate::core::models::Role;
use crate::core::remote_cache::ResourceKey;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;

const IDENTITY_ENDPOINT: &str = "/api/auth/me";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    // The request never produced an HTTP response (DNS, connect, timeout).
    Transport(String),
    // The server refused the credentials (401/403).
    Unauthorized,
    Status(u16),
    Decode(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Transport(msg) => write!(f, "Request failed: {msg}"),
            FetchError::Unauthorized => write!(f, "Server rejected the credentials"),
            FetchError::Status(code) => write!(f, "Server responded with status {code}"),
            FetchError::Decode(msg) => write!(f, "Unexpected response body: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;

// The identity the server associates with a token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResolvedIdentity {
    pub user_id: String,
    pub role: Role,
}

pub trait RemoteFetchOperations: Send + Sync {
    fn fetch(&self, key: ResourceKey, token: Option<&str>) -> Result<serde_json::Value>;
}

pub trait IdentityResolverOperations: Send + Sync {
    fn resolve_identity(&self, token: &str) -> Result<ResolvedIdentity>;
}

pub struct HttpApiClient {
    client: Client,
    base_url: String,
}

impl HttpApiClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(FetchError::from)?;
        Ok(HttpApiClient {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.base_url)
    }

    fn check_status(status: StatusCode) -> Result<()> {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Unauthorized);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(())
    }

    fn get_json<T>(&self, endpoint: &str, token: Option<&str>) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = self.url_for(endpoint);
        log::debug!("HttpApiClient: GET {url}");
        let mut request = self.client.get(&url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request.send()?;
        Self::check_status(response.status())?;
        response
            .json::<T>()
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

impl RemoteFetchOperations for HttpApiClient {
    fn fetch(&self, key: ResourceKey, token: Option<&str>) -> Result<serde_json::Value> {
        self.get_json(key.endpoint(), token)
    }
}

impl IdentityResolverOperations for HttpApiClient {
    fn resolve_identity(&self, token: &str) -> Result<ResolvedIdentity> {
        self.get_json(IDENTITY_ENDPOINT, Some(token))
    }
}
