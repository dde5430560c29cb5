use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, RequestTokenError,
    ResourceOwnerPassword, ResourceOwnerUsername, Scope, TokenResponse, TokenUrl,
};
use std::time::{Duration, SystemTime};
use subsnap_core::{CoreError, RedditApiError, RedditCredentials};
use tracing::{debug, error};

pub const REDDIT_AUTH_URL: &str = "https://www.reddit.com/api/v1/authorize";
pub const REDDIT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// Tokens this close to expiry are renewed before use.
pub const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Reddit issues password-grant tokens for one hour.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct RedditToken {
    pub access_token: String,
    pub expires_at: SystemTime,
    pub scope: Vec<String>,
}

impl RedditToken {
    pub fn expires_within(&self, margin: Duration) -> bool {
        SystemTime::now() + margin >= self.expires_at
    }

    fn from_response(response: &BasicTokenResponse, requested: &[&str]) -> Self {
        let lifetime = response.expires_in().unwrap_or(DEFAULT_TOKEN_LIFETIME);
        let scope = match response.scopes() {
            Some(scopes) => scopes.iter().map(|s| s.to_string()).collect(),
            None => requested.iter().map(|s| s.to_string()).collect(),
        };

        Self {
            access_token: response.access_token().secret().clone(),
            expires_at: SystemTime::now() + lifetime,
            scope,
        }
    }
}

pub(crate) fn build_oauth_client(credentials: &RedditCredentials) -> Result<BasicClient, CoreError> {
    let auth_url = AuthUrl::new(REDDIT_AUTH_URL.to_string()).map_err(|e| CoreError::Internal {
        message: format!("Invalid auth URL: {}", e),
    })?;
    let token_url = TokenUrl::new(REDDIT_TOKEN_URL.to_string()).map_err(|e| CoreError::Internal {
        message: format!("Invalid token URL: {}", e),
    })?;

    Ok(BasicClient::new(
        ClientId::new(credentials.client_id.clone()),
        Some(ClientSecret::new(credentials.client_secret.clone())),
        auth_url,
        Some(token_url),
    ))
}

/// HTTP client for the token endpoint. Redirects are refused so the
/// credentials never follow one.
pub(crate) fn build_token_http(
    user_agent: &str,
    timeout: Duration,
) -> Result<reqwest::Client, CoreError> {
    Ok(reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .build()?)
}

/// Resource-owner password grant for a "script" application.
pub(crate) async fn request_password_token(
    oauth: &BasicClient,
    http: &reqwest::Client,
    credentials: &RedditCredentials,
    scopes: &[&str],
) -> Result<RedditToken, CoreError> {
    debug!("Requesting access token for u/{}", credentials.username);

    let username = ResourceOwnerUsername::new(credentials.username.clone());
    let password = ResourceOwnerPassword::new(credentials.password.clone());

    let mut request = oauth.exchange_password(&username, &password);
    for scope in scopes {
        request = request.add_scope(Scope::new(scope.to_string()));
    }

    let response = request
        .request_async(|req| send_oauth_request(http, req))
        .await
        .map_err(|e| {
            let reason = match e {
                RequestTokenError::ServerResponse(response) => response.to_string(),
                RequestTokenError::Parse(_, body) => String::from_utf8_lossy(&body).into_owned(),
                other => other.to_string(),
            };
            error!("Token request failed: {}", reason);
            CoreError::RedditApi(RedditApiError::AuthenticationFailed { reason })
        })?;

    Ok(RedditToken::from_response(&response, scopes))
}

async fn send_oauth_request(
    http: &reqwest::Client,
    request: HttpRequest,
) -> Result<HttpResponse, reqwest::Error> {
    let response = http
        .request(request.method, request.url.as_str())
        .headers(request.headers)
        .body(request.body)
        .send()
        .await?;

    let status_code = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}
