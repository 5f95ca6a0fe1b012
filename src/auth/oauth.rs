//! OAuth2 password and refresh-token grants against the instance token endpoint

use oauth2::basic::{BasicClient, BasicErrorResponse, BasicTokenResponse};
use oauth2::{
    AuthType, AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, RefreshToken,
    RequestTokenError, ResourceOwnerPassword, ResourceOwnerUsername, TokenResponse, TokenUrl,
};
use serde::Deserialize;

use crate::config::Config;
use crate::error::{AuthFailure, Error, Grant, Result};

/// Tokens returned by a successful grant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantedTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: u64,
}

/// Transport-level outcome of a token request that did not yield a 2xx
#[derive(Debug, thiserror::Error)]
enum GrantHttpError {
    #[error("HTTP {status}")]
    Status {
        status: u16,
        headers: Vec<(String, String)>,
        body: String,
    },
    #[error(transparent)]
    Network(#[from] reqwest::Error),
}

#[derive(Deserialize)]
struct OAuthErrorBody {
    error: String,
    error_description: Option<String>,
}

/// Issues grants for the configured OAuth application
#[derive(Debug, Clone)]
pub struct GrantClient {
    config: Config,
    http: reqwest::Client,
}

impl GrantClient {
    pub fn new(config: Config) -> Result<Self> {
        // Token endpoints must not redirect credentials elsewhere
        let mut builder = reqwest::Client::builder().redirect(reqwest::redirect::Policy::none());
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { config, http })
    }

    /// Build the OAuth2 client for one instance
    fn build_client(&self, instance: &str) -> Result<BasicClient> {
        let auth_url = AuthUrl::new(self.config.authorize_url(instance))
            .map_err(|e| Error::Config(format!("Invalid authorize URL: {}", e)))?;
        let token_url = TokenUrl::new(self.config.token_url(instance))
            .map_err(|e| Error::Config(format!("Invalid token URL: {}", e)))?;

        Ok(BasicClient::new(
            ClientId::new(self.config.client_id.clone()),
            Some(ClientSecret::new(self.config.client_secret.clone())),
            auth_url,
            Some(token_url),
        )
        .set_auth_type(AuthType::RequestBody))
    }

    /// Resource-owner password credentials grant
    pub async fn password(
        &self,
        instance: &str,
        username: &str,
        password: &str,
    ) -> Result<GrantedTokens> {
        let client = self.build_client(instance)?;
        tracing::debug!("Requesting password grant for {}", instance);

        let username = ResourceOwnerUsername::new(username.to_string());
        let password = ResourceOwnerPassword::new(password.to_string());
        let http = self.http.clone();

        let response = client
            .exchange_password(&username, &password)
            .request_async(|request| send(http, request))
            .await
            .map_err(|e| grant_failure(Grant::Password, e))?;

        granted(Grant::Password, response)
    }

    /// Refresh-token grant
    pub async fn refresh(&self, instance: &str, refresh_token: &str) -> Result<GrantedTokens> {
        let client = self.build_client(instance)?;
        tracing::debug!("Requesting refresh grant for {}", instance);

        let refresh_token = RefreshToken::new(refresh_token.to_string());
        let http = self.http.clone();

        let response = client
            .exchange_refresh_token(&refresh_token)
            .request_async(|request| send(http, request))
            .await
            .map_err(|e| grant_failure(Grant::RefreshToken, e))?;

        granted(Grant::RefreshToken, response)
    }
}

/// HTTP adapter for `oauth2`: non-2xx responses are returned as errors so
/// their status and headers survive into `AuthFailure`.
async fn send(
    http: reqwest::Client,
    request: HttpRequest,
) -> std::result::Result<HttpResponse, GrantHttpError> {
    let response = http
        .request(request.method, request.url.as_str())
        .headers(request.headers)
        .body(request.body)
        .send()
        .await?;

    let status_code = response.status();
    let headers = response.headers().to_owned();
    let body = response.bytes().await?.to_vec();

    if !status_code.is_success() {
        return Err(GrantHttpError::Status {
            status: status_code.as_u16(),
            headers: header_pairs(&headers),
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}

fn header_pairs(headers: &reqwest::header::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

fn describe_body(body: &str) -> String {
    if let Ok(err) = serde_json::from_str::<OAuthErrorBody>(body) {
        return match err.error_description {
            Some(desc) if !desc.is_empty() => format!("{}: {}", err.error, desc),
            _ => err.error,
        };
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "empty response body".to_string()
    } else {
        trimmed.to_string()
    }
}

fn grant_failure(
    grant: Grant,
    err: RequestTokenError<GrantHttpError, BasicErrorResponse>,
) -> Error {
    let failure = match err {
        RequestTokenError::Request(GrantHttpError::Status {
            status,
            headers,
            body,
        }) => AuthFailure {
            grant,
            status: Some(status),
            headers,
            detail: describe_body(&body),
        },
        RequestTokenError::Request(GrantHttpError::Network(e)) => AuthFailure {
            grant,
            status: e.status().map(|s| s.as_u16()),
            headers: Vec::new(),
            detail: e.to_string(),
        },
        RequestTokenError::ServerResponse(resp) => AuthFailure {
            grant,
            status: None,
            headers: Vec::new(),
            detail: resp.to_string(),
        },
        RequestTokenError::Parse(e, _) => AuthFailure {
            grant,
            status: None,
            headers: Vec::new(),
            detail: format!("Malformed token response: {}", e),
        },
        RequestTokenError::Other(msg) => AuthFailure {
            grant,
            status: None,
            headers: Vec::new(),
            detail: msg,
        },
    };

    tracing::warn!("{}", failure);
    Error::Auth(failure)
}

fn granted(grant: Grant, response: BasicTokenResponse) -> Result<GrantedTokens> {
    let expires_in = response.expires_in().map(|d| d.as_secs()).ok_or_else(|| {
        Error::Auth(AuthFailure {
            grant,
            status: None,
            headers: Vec::new(),
            detail: "Token response missing expires_in".to_string(),
        })
    })?;

    Ok(GrantedTokens {
        access_token: response.access_token().secret().to_string(),
        refresh_token: response.refresh_token().map(|t| t.secret().to_string()),
        expires_in,
    })
}
