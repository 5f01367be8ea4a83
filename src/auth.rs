use crate::api::{check_status, ACCEPT_VIMEO};
use crate::config::{Config, CALLBACK_PATH};
use crate::error::{AppError, Result};
use crate::token::{Token, TokenStore};
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Scopes needed to see private videos and their file links.
pub const SCOPES: &[&str] = &["private", "video_files"];

const SUCCESS_PAGE: &str = "<html><head><title>Authorization Successful</title></head>\
<body><h1>Authorization Successful!</h1>\
<p>You can close this window and return to the command line.</p></body></html>";

/// Body of `POST /oauth/access_token`.
#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    code: &'a str,
    redirect_uri: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// What the redirect to the callback path carried.
#[derive(Debug, PartialEq, Eq)]
pub enum CallbackOutcome {
    Code(String),
    Failed(String),
}

/// Shared state of the callback server; the sender is taken by the first
/// request that reaches the callback path.
#[derive(Clone)]
struct CallbackState {
    expected_state: Arc<str>,
    sender: Arc<Mutex<Option<oneshot::Sender<CallbackOutcome>>>>,
}

/// OAuth2 authorization-code flow against Vimeo.
///
/// # Steps
/// 1. Binds the callback listener on the configured port
/// 2. Sends the user to the authorization page
/// 3. Waits for the redirect carrying the code
/// 4. Exchanges the code for a token and saves it
pub struct AuthFlow {
    config: Config,
    http: reqwest::Client,
    store: TokenStore,
}

impl AuthFlow {
    pub fn new(config: Config) -> Self {
        let store = TokenStore::new(config.token_file.clone());
        Self {
            config,
            http: reqwest::Client::new(),
            store,
        }
    }

    /// Runs the interactive flow and returns the saved token.
    pub async fn run(&self) -> Result<Token> {
        let (client_id, _) = self.config.credentials()?;
        let state = generate_state();
        let auth_url = authorization_url(
            &self.config.api_base,
            client_id,
            &self.config.redirect_uri(),
            &state,
        )?;

        let listener = TcpListener::bind(("127.0.0.1", self.config.callback_port))
            .await
            .map_err(|e| {
                AppError::Auth(format!(
                    "Could not listen on port {} for the OAuth callback: {}",
                    self.config.callback_port, e
                ))
            })?;

        println!("Opening browser for Vimeo authentication...");
        println!("If the browser doesn't open automatically, visit: {}", auth_url);
        if let Err(e) = open::that(auth_url.as_str()) {
            warn!("Failed to open browser: {}", e);
        }

        println!(
            "Waiting for authentication (timeout in {} minutes)...",
            self.config.auth_timeout_secs / 60
        );
        let code = wait_for_code(
            listener,
            &state,
            Duration::from_secs(self.config.auth_timeout_secs),
        )
        .await?;

        self.complete(&code).await
    }

    /// Exchanges an authorization code and persists the resulting token.
    pub async fn complete(&self, code: &str) -> Result<Token> {
        let (client_id, client_secret) = self.config.credentials()?;
        let token = exchange_code(
            &self.http,
            &self.config.api_base,
            client_id,
            client_secret,
            code,
            &self.config.redirect_uri(),
        )
        .await?;
        self.store.save(&token)?;
        info!(path = %self.store.path().display(), "token saved");
        Ok(token)
    }
}

/// Builds the URL of Vimeo's authorization page.
pub fn authorization_url(
    api_base: &str,
    client_id: &str,
    redirect_uri: &str,
    state: &str,
) -> Result<Url> {
    let mut url = Url::parse(api_base)?.join("/oauth/authorize")?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", &SCOPES.join(" "))
        .append_pair("state", state);
    Ok(url)
}

pub fn generate_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Interprets the query parameters of the OAuth redirect.
pub fn parse_callback(params: &HashMap<String, String>, expected_state: &str) -> CallbackOutcome {
    let param = |name: &str| params.get(name).map(String::as_str);

    if let Some(error) = param("error") {
        let detail = param("error_description").unwrap_or_default();
        return CallbackOutcome::Failed(format!("{} {}", error, detail).trim().to_string());
    }
    if param("state") != Some(expected_state) {
        return CallbackOutcome::Failed("state mismatch in OAuth callback".into());
    }
    match param("code") {
        Some(code) if !code.is_empty() => CallbackOutcome::Code(code.to_string()),
        _ => CallbackOutcome::Failed("no authorization code received".into()),
    }
}

fn callback_router(expected_state: &str, sender: oneshot::Sender<CallbackOutcome>) -> Router {
    let state = CallbackState {
        expected_state: Arc::from(expected_state),
        sender: Arc::new(Mutex::new(Some(sender))),
    };
    Router::new()
        .route(CALLBACK_PATH, get(callback_handler))
        .with_state(state)
}

async fn callback_handler(
    State(state): State<CallbackState>,
    Query(params): Query<HashMap<String, String>>,
) -> Html<String> {
    let outcome = parse_callback(&params, &state.expected_state);
    let page = match &outcome {
        CallbackOutcome::Code(_) => SUCCESS_PAGE.to_string(),
        CallbackOutcome::Failed(reason) => format!(
            "<html><head><title>Authorization Failed</title></head>\
             <body><h1>Authorization Failed</h1><p>Error: {}</p></body></html>",
            reason
        ),
    };

    let sender = state.sender.lock().ok().and_then(|mut slot| slot.take());
    match sender {
        Some(tx) => {
            if tx.send(outcome).is_err() {
                debug!("callback arrived after the flow stopped waiting");
            }
        }
        None => debug!("duplicate callback request ignored"),
    }
    Html(page)
}

/// Serves the callback path until the OAuth redirect arrives or time runs out.
#[instrument(skip(listener, expected_state))]
pub async fn wait_for_code(
    listener: TcpListener,
    expected_state: &str,
    timeout: Duration,
) -> Result<String> {
    let (outcome_tx, outcome_rx) = oneshot::channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let app = callback_router(expected_state, outcome_tx);

    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    let received = tokio::time::timeout(timeout, outcome_rx).await;

    let _ = shutdown_tx.send(());
    match tokio::time::timeout(Duration::from_secs(2), server).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => warn!("Callback server error: {}", e),
        Ok(Err(e)) => warn!("Callback server task failed: {}", e),
        Err(_) => debug!("callback server still draining connections"),
    }

    match received {
        Err(_) => Err(AppError::Auth("Authentication timed out. Please try again.".into())),
        Ok(Err(_)) => Err(AppError::Auth("Callback server stopped unexpectedly".into())),
        Ok(Ok(CallbackOutcome::Code(code))) => Ok(code),
        Ok(Ok(CallbackOutcome::Failed(reason))) => {
            Err(AppError::Auth(format!("Authorization failed: {}", reason)))
        }
    }
}

/// Trades an authorization code for an access token.
///
/// # Errors
/// `AppError::Auth` when Vimeo rejects the exchange or the response has
/// no access token.
#[instrument(skip(http, client_secret, code))]
pub async fn exchange_code(
    http: &reqwest::Client,
    api_base: &str,
    client_id: &str,
    client_secret: &str,
    code: &str,
    redirect_uri: &str,
) -> Result<Token> {
    let url = Url::parse(api_base)?.join("/oauth/access_token")?;
    let response = http
        .post(url)
        .basic_auth(client_id, Some(client_secret))
        .header(reqwest::header::ACCEPT, ACCEPT_VIMEO)
        .json(&TokenRequest {
            grant_type: "authorization_code",
            code,
            redirect_uri,
        })
        .send()
        .await?;

    let response = check_status(response).await.map_err(|e| match e {
        AppError::Api { status, message, .. } => {
            AppError::Auth(format!("Token exchange failed ({}): {}", status, message))
        }
        other => other,
    })?;

    let body: TokenResponse = response.json().await?;
    let access_token = body
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Auth("Token exchange response contained no access token".into()))?;

    let mut token = Token::new(access_token).with_expires_in(body.expires_in);
    token.token_type = body.token_type;
    token.scope = body.scope;
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_url() {
        let url = authorization_url(
            "https://api.vimeo.com",
            "client",
            "http://localhost:8080/callback",
            "xyz",
        )
        .unwrap();
        assert_eq!(url.path(), "/oauth/authorize");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("scope".into(), "private video_files".into())));
        assert!(pairs.contains(&("redirect_uri".into(), "http://localhost:8080/callback".into())));
        assert!(pairs.contains(&("state".into(), "xyz".into())));
    }

    #[test]
    fn test_state_is_random() {
        let a = generate_state();
        assert_eq!(a.len(), 32);
        assert_ne!(a, generate_state());
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_callback() {
        assert_eq!(
            parse_callback(&params(&[("code", "abc"), ("state", "s1")]), "s1"),
            CallbackOutcome::Code("abc".into())
        );
        assert!(matches!(
            parse_callback(&params(&[("code", "abc"), ("state", "other")]), "s1"),
            CallbackOutcome::Failed(_)
        ));
        assert_eq!(
            parse_callback(&params(&[("error", "access_denied"), ("state", "s1")]), "s1"),
            CallbackOutcome::Failed("access_denied".into())
        );
        assert!(matches!(
            parse_callback(&params(&[("state", "s1")]), "s1"),
            CallbackOutcome::Failed(_)
        ));
    }

    #[tokio::test]
    async fn test_wait_for_code_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let browser = tokio::spawn(async move {
            let client = reqwest::Client::new();
            let miss = client
                .get(format!("http://{}/favicon.ico", addr))
                .send()
                .await
                .unwrap();
            assert_eq!(miss.status(), 404);
            client
                .get(format!("http://{}/callback?code=the-code&state=st", addr))
                .send()
                .await
                .unwrap()
                .text()
                .await
                .unwrap()
        });

        let code = wait_for_code(listener, "st", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(code, "the-code");
        assert!(browser.await.unwrap().contains("Authorization Successful"));
    }

    #[tokio::test]
    async fn test_idle_connection_does_not_block_redirect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let browser = tokio::spawn(async move {
            // A preconnected socket that never sends a request.
            let _idle = tokio::net::TcpStream::connect(addr).await.unwrap();
            reqwest::Client::new()
                .get(format!("http://{}/callback?code=the-code&state=st", addr))
                .send()
                .await
                .map(|r| r.status().as_u16())
        });

        let code = wait_for_code(listener, "st", Duration::from_secs(3))
            .await
            .unwrap();
        assert_eq!(code, "the-code");
        assert_eq!(browser.await.unwrap().unwrap(), 200);
    }

    #[tokio::test]
    async fn test_denied_authorization_is_auth_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let browser = tokio::spawn(async move {
            reqwest::Client::new()
                .get(format!("http://{}/callback?error=access_denied&state=st", addr))
                .send()
                .await
                .unwrap()
                .text()
                .await
                .unwrap()
        });

        let result = wait_for_code(listener, "st", Duration::from_secs(3)).await;
        assert!(matches!(result, Err(AppError::Auth(msg)) if msg.contains("access_denied")));
        assert!(browser.await.unwrap().contains("Authorization Failed"));
    }

    #[tokio::test]
    async fn test_wait_for_code_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let result = wait_for_code(listener, "st", Duration::from_millis(50)).await;
        assert!(matches!(result, Err(AppError::Auth(_))));
    }
}
