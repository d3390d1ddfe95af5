// This file is part of the terraform-provider-ciphertrust project
//
// Copyright (C) The terraform-provider-ciphertrust authors, 2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{ApiError, CipherTrustApi, Result};

const AUTH_PATH: &str = "api/v1/auth/tokens";

/// Tokens are renewed slightly before CipherTrust Manager expires them
const EXPIRY_MARGIN: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct ClientConfig {
    pub address: String,
    pub username: String,
    pub password: String,
    pub domain: String,
    pub auth_domain: String,
    pub no_ssl_verify: bool,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("domain", &self.domain)
            .field("auth_domain", &self.auth_domain)
            .field("no_ssl_verify", &self.no_ssl_verify)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    jwt: String,
    #[serde(default)]
    duration: Option<u64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug)]
struct Token {
    jwt: String,
    refresh_token: Option<String>,
    expires_at: Instant,
}

impl Token {
    fn is_valid(&self) -> bool {
        Instant::now() + EXPIRY_MARGIN < self.expires_at
    }
}

/// [`CipherTrustApi`] over HTTPS, authenticated with a bearer token
#[derive(Debug)]
pub struct HttpClient {
    config: ClientConfig,
    http: reqwest::Client,
    token: Mutex<Option<Token>>,
}

impl HttpClient {
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        if config.address.is_empty() {
            return Err(ApiError::Config("address must not be empty".to_owned()).into());
        }
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .danger_accept_invalid_certs(config.no_ssl_verify)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            config,
            http,
            token: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.config.address, path)
    }

    async fn request_token(&self, body: Value) -> Result<Token> {
        let response = self
            .http
            .post(self.url(AUTH_PATH))
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(token_error(status.as_u16(), &text));
        }
        let token: TokenResponse = serde_json::from_str(&text)?;
        Ok(Token {
            jwt: token.jwt,
            refresh_token: token.refresh_token,
            expires_at: Instant::now() + Duration::from_secs(token.duration.unwrap_or(300)),
        })
    }

    async fn login(&self) -> Result<Token> {
        info!(
            address = %self.config.address,
            username = %self.config.username,
            "authenticating to CipherTrust Manager"
        );
        self.request_token(json!({
            "grant_type": "password",
            "username": self.config.username,
            "password": self.config.password,
            "domain": self.config.domain,
            "auth_domain": self.config.auth_domain,
        }))
        .await
    }

    async fn renew(&self, current: Option<&Token>) -> Result<Token> {
        if let Renewal::Refresh(refresh_token) = Renewal::of(current) {
            match self
                .request_token(json!({
                    "grant_type": "refresh_token",
                    "refresh_token": refresh_token,
                }))
                .await
            {
                Ok(token) => return Ok(token),
                Err(err) => warn!("refresh token rejected, logging in again: {err}"),
            }
        }
        self.login().await
    }

    async fn bearer(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        match guard.as_ref() {
            Some(token) if token.is_valid() => Ok(token.jwt.clone()),
            current => {
                let token = self.renew(current).await?;
                let jwt = token.jwt.clone();
                *guard = Some(token);
                Ok(jwt)
            }
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let mut retried = false;
        loop {
            let jwt = self.bearer().await?;
            let mut request = self
                .http
                .request(method.clone(), self.url(path))
                .bearer_auth(jwt)
                .query(query);
            if let Some(body) = body {
                request = request.json(body);
            }

            debug!(%method, path, "sending request");
            let response = request.send().await?;
            let status = response.status();
            let text = response.text().await?;

            if status.is_success() {
                if text.trim().is_empty() {
                    return Ok(Value::Null);
                }
                return Ok(serde_json::from_str(&text)?);
            }

            let err = ApiError::from_response(status.as_u16(), &text);
            if retry_after_refresh(&err, retried) {
                retried = true;
                self.refresh_token().await?;
            } else {
                debug!(%method, path, status = status.as_u16(), "request failed: {err}");
                return Err(err);
            }
        }
    }
}

#[async_trait]
impl CipherTrustApi for HttpClient {
    async fn get(&self, path: &str) -> Result<Value> {
        self.send(Method::GET, path, &[], None).await
    }

    async fn list(&self, path: &str, filters: &[(&str, &str)]) -> Result<Value> {
        self.send(Method::GET, path, filters, None).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(Method::POST, path, &[], Some(body)).await
    }

    async fn post_no_data(&self, path: &str) -> Result<Value> {
        self.send(Method::POST, path, &[], None).await
    }

    async fn patch(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(Method::PATCH, path, &[], Some(body)).await
    }

    async fn refresh_token(&self) -> Result<()> {
        let mut guard = self.token.lock().await;
        let token = self.renew(guard.as_ref()).await?;
        *guard = Some(token);
        debug!("authentication token refreshed");
        Ok(())
    }
}

/// How an expired or missing token gets replaced
#[derive(Debug, PartialEq, Eq)]
enum Renewal<'a> {
    /// Refresh token grant, falling back to a login when rejected
    Refresh(&'a str),
    Login,
}

impl<'a> Renewal<'a> {
    fn of(current: Option<&'a Token>) -> Self {
        match current.and_then(|token| token.refresh_token.as_deref()) {
            Some(refresh_token) => Renewal::Refresh(refresh_token),
            None => Renewal::Login,
        }
    }
}

/// A rejected request is replayed once with a renewed token
fn retry_after_refresh(err: &ApiError, retried: bool) -> bool {
    matches!(err, ApiError::Unauthorized(_)) && !retried
}

/// Any failure of the token endpoint is an authentication failure
fn token_error(status: u16, body: &str) -> ApiError {
    match ApiError::from_response(status, body) {
        ApiError::Status { message, .. } => ApiError::Unauthorized(message),
        err => err,
    }
}

fn join_url(address: &str, path: &str) -> String {
    format!(
        "{}/{}",
        address.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
