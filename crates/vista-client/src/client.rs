//! Backend API client over reqwest.
//!
//! [`BackendClient`] implements every persistence and data seam the engine
//! talks to, so a single instance backs the whole entity page.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use vista_config::BackendConfig;
use vista_views::schedule::{
    EmailLog, EmailSchedule, EmailScheduleCreate, EmailScheduleUpdate, ScheduleStore,
};
use vista_views::view::{EntitySource, SavedView, SavedViewCreate, SavedViewUpdate, ViewStore};
use vista_widget::{EntityDetail, EntityResolution, PageEnvelope, PageQuery, WidgetDataSource};

use crate::error::{ClientError, Result};

/// HTTP client for the dashboard backend.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl BackendClient {
    /// Build a client from config; the bearer token comes from `token_env`.
    ///
    /// A missing token variable is not an error: requests go out
    /// unauthenticated and the backend decides.
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        let token = std::env::var(&config.token_env).ok().filter(|t| !t.is_empty());
        if token.is_none() {
            debug!(token_env = %config.token_env, "no bearer token set");
        }
        Self::new(&config.base_url, token, config.timeout_secs)
    }

    pub fn new(base_url: &str, token: Option<String>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ClientError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a path; absolute endpoints pass through.
    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Absolute URL under the base with each segment percent-encoded.
    fn segment_url(&self, segments: &[&str]) -> Result<String> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::Config(format!("Invalid base URL {}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| ClientError::Config(format!("Base URL {} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url.into())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send_raw(&self, target: &str, builder: RequestBuilder) -> Result<String> {
        let response = builder
            .send()
            .await
            .map_err(|e| ClientError::http(target, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::http(target, e))?;

        if !status.is_success() {
            warn!(target = %target, status = status.as_u16(), "backend request failed");
            return Err(ClientError::from_http_status(target, status.as_u16(), &body));
        }
        debug!(target = %target, status = status.as_u16(), bytes = body.len(), "backend response");
        Ok(body)
    }

    async fn send<T: DeserializeOwned>(&self, target: &str, builder: RequestBuilder) -> Result<T> {
        let body = self.send_raw(target, builder).await?;
        serde_json::from_str(&body).map_err(|e| ClientError::Decode {
            target: target.to_string(),
            message: e.to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        self.send(path, self.request(Method::GET, path).query(query))
            .await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send(path, self.request(Method::POST, path).json(body))
            .await
    }

    async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send(path, self.request(Method::PUT, path).json(body))
            .await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.send_raw(path, self.request(Method::DELETE, path))
            .await
            .map(|_| ())
    }
}

/// `entity_type` / `entity_id` filter pairs, skipping unset ones.
fn entity_params<'a>(
    entity_type: Option<&'a str>,
    entity_id: Option<&'a str>,
) -> Vec<(&'static str, &'a str)> {
    let mut params = Vec::new();
    if let Some(t) = entity_type {
        params.push(("entity_type", t));
    }
    if let Some(id) = entity_id {
        params.push(("entity_id", id));
    }
    params
}

#[async_trait]
impl EntitySource for BackendClient {
    async fn entity_detail(
        &self,
        entity_type: &str,
        entity_id: &str,
        view_id: Option<&str>,
    ) -> vista_core::Result<EntityDetail> {
        let path = self.segment_url(&["api", "entities", entity_type, entity_id])?;
        let query: Vec<(&str, &str)> = view_id.map(|v| ("view_id", v)).into_iter().collect();
        Ok(self.get(&path, &query).await?)
    }

    async fn resolve(&self, query: &str) -> vista_core::Result<EntityResolution> {
        Ok(self.get("/api/entities/resolve", &[("q", query)]).await?)
    }
}

#[async_trait]
impl WidgetDataSource for BackendClient {
    async fn fetch_page(&self, query: &PageQuery) -> vista_core::Result<PageEnvelope> {
        let params = query.params();
        debug!(endpoint = %query.endpoint, params = params.len(), "fetching widget page");
        let builder = self.request(Method::GET, &query.endpoint).query(&params);
        Ok(self.send(&query.endpoint, builder).await?)
    }
}

#[async_trait]
impl ViewStore for BackendClient {
    async fn list_views(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> vista_core::Result<Vec<SavedView>> {
        let params = entity_params(Some(entity_type), Some(entity_id));
        Ok(self.get("/api/views/", &params).await?)
    }

    async fn create_view(&self, body: &SavedViewCreate) -> vista_core::Result<SavedView> {
        Ok(self.post("/api/views/", body).await?)
    }

    async fn update_view(
        &self,
        view_id: &str,
        body: &SavedViewUpdate,
    ) -> vista_core::Result<SavedView> {
        let path = self.segment_url(&["api", "views", view_id])?;
        Ok(self.put(&path, body).await?)
    }

    async fn delete_view(&self, view_id: &str) -> vista_core::Result<()> {
        let path = self.segment_url(&["api", "views", view_id])?;
        Ok(self.delete(&path).await?)
    }
}

#[async_trait]
impl ScheduleStore for BackendClient {
    async fn create_schedule(&self, body: &EmailScheduleCreate) -> vista_core::Result<EmailSchedule> {
        Ok(self.post("/api/schedules/", body).await?)
    }

    async fn list_schedules(
        &self,
        entity_type: Option<&str>,
        entity_id: Option<&str>,
    ) -> vista_core::Result<Vec<EmailSchedule>> {
        let params = entity_params(entity_type, entity_id);
        Ok(self.get("/api/schedules/", &params).await?)
    }

    async fn get_schedule(&self, schedule_id: &str) -> vista_core::Result<EmailSchedule> {
        let path = self.segment_url(&["api", "schedules", schedule_id])?;
        Ok(self.get(&path, &[]).await?)
    }

    async fn update_schedule(
        &self,
        schedule_id: &str,
        body: &EmailScheduleUpdate,
    ) -> vista_core::Result<EmailSchedule> {
        let path = self.segment_url(&["api", "schedules", schedule_id])?;
        Ok(self.put(&path, body).await?)
    }

    async fn delete_schedule(&self, schedule_id: &str) -> vista_core::Result<()> {
        let path = self.segment_url(&["api", "schedules", schedule_id])?;
        Ok(self.delete(&path).await?)
    }

    async fn schedule_logs(&self, schedule_id: &str) -> vista_core::Result<Vec<EmailLog>> {
        let path = self.segment_url(&["api", "schedules", schedule_id, "logs"])?;
        Ok(self.get(&path, &[]).await?)
    }

    async fn send_now(&self, schedule_id: &str) -> vista_core::Result<EmailLog> {
        let path = self.segment_url(&["api", "schedules", schedule_id, "send-now"])?;
        Ok(self.send(&path, self.request(Method::POST, &path)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let client = BackendClient::new("http://localhost:8000/", None, 5).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.url("/api/views/"), "http://localhost:8000/api/views/");
        assert_eq!(client.url("api/views/"), "http://localhost:8000/api/views/");
        assert_eq!(client.url("https://data.example.com/x"), "https://data.example.com/x");
    }

    #[test]
    fn test_segments_are_encoded() {
        let client = BackendClient::new("http://localhost:8000/", None, 5).unwrap();
        assert_eq!(
            client.segment_url(&["api", "entities", "stock", "BRK/B x"]).unwrap(),
            "http://localhost:8000/api/entities/stock/BRK%2FB%20x"
        );
        let prefixed = BackendClient::new("http://localhost:8000/dash", None, 5).unwrap();
        assert_eq!(
            prefixed.segment_url(&["api", "views", "v1"]).unwrap(),
            "http://localhost:8000/dash/api/views/v1"
        );
    }

    #[test]
    fn test_entity_params_skip_unset() {
        assert_eq!(entity_params(Some("stock"), None), vec![("entity_type", "stock")]);
        assert!(entity_params(None, None).is_empty());
    }

    #[test]
    fn test_from_config_without_token() {
        let config = BackendConfig {
            base_url: "http://backend".into(),
            timeout_secs: 1,
            token_env: "VISTA_TEST_TOKEN_THAT_IS_NEVER_SET".into(),
        };
        let client = BackendClient::from_config(&config).unwrap();
        assert!(client.token.is_none());
    }
}
