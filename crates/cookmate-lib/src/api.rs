//! Client for the CookMate backend REST API.

use std::time::Duration;

use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use cookmate_core::types::{AuthUser, Favorite, PantryItem, Recipe, VoiceReply};

/// Shelf life the backend assumes when none is given.
pub const DEFAULT_EXPIRY_DAYS: u32 = 7;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("{0}")]
    Rejected(String),

    #[error("invalid backend URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".into(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Deserialize)]
struct AuthResponse {
    #[serde(default)]
    success: bool,
    user: Option<AuthUser>,
    error: Option<String>,
}

#[derive(Clone)]
pub struct CookmateClient {
    http: reqwest::Client,
    base: Url,
}

impl CookmateClient {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {e}", config.base_url)))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(config.base_url));
        }
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    // ─── Recipes ───────────────────────────────────────────────────────────

    pub async fn recipes(&self) -> Result<Vec<Recipe>, ApiError> {
        self.get_json(&["api", "recipes"], &[]).await
    }

    pub async fn recipe(&self, id: &str) -> Result<Recipe, ApiError> {
        self.get_json(&["api", "recipes", id], &[]).await
    }

    /// Free-text question to the backend's voice assistant.
    pub async fn ask(&self, text: &str) -> Result<String, ApiError> {
        let body = serde_json::json!({ "text": text });
        let reply: VoiceReply = self
            .send_json(Method::POST, &["api", "voice"], &[], Some(&body))
            .await?;
        Ok(reply.response)
    }

    // ─── Pantry ────────────────────────────────────────────────────────────

    pub async fn pantry(&self, user: &str) -> Result<Vec<PantryItem>, ApiError> {
        self.get_json(&["api", "pantry"], &[("user", user)]).await
    }

    pub async fn add_pantry_item(
        &self,
        user: &str,
        name: &str,
        expiry_days: Option<u32>,
    ) -> Result<(), ApiError> {
        let body = serde_json::json!({
            "name": name,
            "expiry": expiry_days.unwrap_or(DEFAULT_EXPIRY_DAYS),
        });
        let _: serde_json::Value = self
            .send_json(Method::POST, &["api", "pantry"], &[("user", user)], Some(&body))
            .await?;
        Ok(())
    }

    pub async fn remove_pantry_item(&self, item_id: &str) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .send_json(Method::DELETE, &["api", "pantry", item_id], &[], None)
            .await?;
        Ok(())
    }

    // ─── Favorites ─────────────────────────────────────────────────────────

    pub async fn favorites(&self, user: &str) -> Result<Vec<Favorite>, ApiError> {
        self.get_json(&["api", "favorites"], &[("user", user)]).await
    }

    pub async fn add_favorite(&self, user: &str, recipe_id: &str) -> Result<(), ApiError> {
        let body = serde_json::json!({ "recipeId": recipe_id });
        let _: serde_json::Value = self
            .send_json(Method::POST, &["api", "favorites"], &[("user", user)], Some(&body))
            .await?;
        Ok(())
    }

    // ─── Auth ──────────────────────────────────────────────────────────────

    pub async fn login(&self, email: &str, pass: &str) -> Result<AuthUser, ApiError> {
        let resp = self.auth(&["api", "auth", "login"], email, pass).await?;
        resp.user.ok_or_else(|| ApiError::Rejected("login response had no user".into()))
    }

    pub async fn register(&self, email: &str, pass: &str) -> Result<(), ApiError> {
        self.auth(&["api", "auth", "register"], email, pass).await?;
        Ok(())
    }

    /// Auth endpoints answer `{success, error}` with 400/401 on refusal.
    async fn auth(&self, path: &[&str], email: &str, pass: &str) -> Result<AuthResponse, ApiError> {
        let body = serde_json::json!({ "email": email, "pass": pass });
        let resp = self
            .request(Method::POST, path, &[])?
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;
        match serde_json::from_str::<AuthResponse>(&text) {
            Ok(auth) if auth.success => Ok(auth),
            Ok(auth) => Err(ApiError::Rejected(
                auth.error.unwrap_or_else(|| format!("refused ({status})")),
            )),
            Err(_) => Err(ApiError::Status { status, body: text }),
        }
    }

    // ─── Plumbing ──────────────────────────────────────────────────────────

    fn url(&self, path: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(path);
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        path: &[&str],
        query: &[(&str, &str)],
    ) -> Result<reqwest::RequestBuilder, ApiError> {
        let url = self.url(path)?;
        debug!("api: {method} {url}");
        let mut req = self.http.request(method, url);
        if !query.is_empty() {
            req = req.query(query);
        }
        Ok(req)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        self.send_json(Method::GET, path, query, None).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &[&str],
        query: &[(&str, &str)],
        body: Option<&serde_json::Value>,
    ) -> Result<T, ApiError> {
        let mut req = self.request(method, path, query)?;
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }
        Ok(resp.json().await?)
    }
}
