//! `reqwest` implementation of the HTTP collaborator.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use super::api::{ApiClient, WebPushSubscription};
use super::credentials::CredentialProvider;
use crate::config::ApiSettings;
use crate::domain::entities::{Credential, FeedKey, Notification, PostPage, RoomState, RoomSummary};
use crate::shared::error::{AppError, ErrorResponse};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublicKeyResponse {
    public_key: String,
}

/// HTTP client for the community REST API.
///
/// Holds the current bearer credential and serves as the session's
/// [`CredentialProvider`].
pub struct HttpApiClient {
    http: Client,
    base_url: String,
    credential: RwLock<Credential>,
}

impl HttpApiClient {
    pub fn new(settings: &ApiSettings, credential: Credential) -> Result<Self, AppError> {
        let http = Client::builder()
            .timeout(settings.timeout())
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            credential: RwLock::new(credential),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(self.credential.read().expose())
    }

    async fn check(response: Response) -> Result<Response, AppError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = match response.json::<ErrorResponse>().await {
            Ok(body) if !body.message.is_empty() => body.message,
            _ => status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
        };
        Err(AppError::from_status(status.as_u16(), message))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, AppError> {
        let response = self.authorized(request).send().await.map_err(transport_error)?;
        Ok(Self::check(response).await?.json::<T>().await?)
    }

    async fn send_empty(&self, request: RequestBuilder) -> Result<(), AppError> {
        let response = self.authorized(request).send().await.map_err(transport_error)?;
        Self::check(response).await?;
        Ok(())
    }
}

fn transport_error(error: reqwest::Error) -> AppError {
    if error.is_timeout() || error.is_connect() {
        AppError::TransientNetwork(error.to_string())
    } else {
        AppError::Http(error)
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    #[instrument(skip(self))]
    async fn fetch_online_users(&self) -> Result<Vec<i64>, AppError> {
        self.send_json(self.http.get(self.url("/api/users/online")))
            .await
    }

    #[instrument(skip(self))]
    async fn fetch_rooms(&self) -> Result<Vec<RoomSummary>, AppError> {
        self.send_json(self.http.get(self.url("/api/chat/rooms")))
            .await
    }

    #[instrument(skip(self))]
    async fn join_room(&self, room_id: i64) -> Result<(), AppError> {
        self.send_empty(
            self.http
                .post(self.url(&format!("/api/chat/rooms/{room_id}/join"))),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn fetch_room_state(&self, room_id: i64) -> Result<RoomState, AppError> {
        self.send_json(
            self.http
                .get(self.url(&format!("/api/chat/rooms/{room_id}/state"))),
        )
        .await
    }

    #[instrument(skip(self), fields(filter = %key))]
    async fn fetch_posts(
        &self,
        key: &FeedKey,
        page: u32,
        page_size: u32,
    ) -> Result<PostPage, AppError> {
        let mut query: Vec<(&str, String)> =
            vec![("page", page.to_string()), ("limit", page_size.to_string())];
        if let Some(category) = key.category() {
            query.push(("category", category.to_string()));
        }
        if let Some(search) = key.search() {
            query.push(("search", search.to_string()));
        }
        self.send_json(self.http.get(self.url("/api/posts")).query(&query))
            .await
    }

    #[instrument(skip(self))]
    async fn fetch_notifications(&self, limit: usize) -> Result<Vec<Notification>, AppError> {
        self.send_json(
            self.http
                .get(self.url("/api/notifications"))
                .query(&[("limit", limit)]),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn mark_notification_read(&self, id: &str) -> Result<(), AppError> {
        self.send_empty(
            self.http
                .patch(self.url(&format!("/api/notifications/{id}/read"))),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn mark_all_notifications_read(&self) -> Result<(), AppError> {
        self.send_empty(self.http.patch(self.url("/api/notifications/read-all")))
            .await
    }

    #[instrument(skip(self, token))]
    async fn register_device_token(&self, token: &str, platform: &str) -> Result<(), AppError> {
        let body = serde_json::json!({ "token": token, "platform": platform });
        self.send_empty(self.http.post(self.url("/api/push/device-token")).json(&body))
            .await
    }

    #[instrument(skip(self))]
    async fn fetch_push_public_key(&self) -> Result<String, AppError> {
        let response: PublicKeyResponse = self
            .send_json(self.http.get(self.url("/api/push/vapid-public-key")))
            .await?;
        Ok(response.public_key)
    }

    #[instrument(skip(self, subscription))]
    async fn subscribe_web_push(
        &self,
        subscription: &WebPushSubscription,
    ) -> Result<(), AppError> {
        self.send_empty(
            self.http
                .post(self.url("/api/push/subscribe"))
                .json(subscription),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn fetch_blob(&self, url: &str) -> Result<Bytes, AppError> {
        let target = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            self.url(url)
        };
        let response = self
            .authorized(self.http.get(target))
            .send()
            .await
            .map_err(transport_error)?;
        Ok(Self::check(response).await?.bytes().await?)
    }
}

#[async_trait]
impl CredentialProvider for HttpApiClient {
    fn current(&self) -> Credential {
        self.credential.read().clone()
    }

    #[instrument(skip(self))]
    async fn refresh(&self) -> Result<Credential, AppError> {
        debug!("Refreshing access token");
        let response: RefreshResponse = match self
            .send_json(self.http.post(self.url("/api/auth/refresh")))
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Access token refresh failed");
                return Err(e);
            }
        };
        let credential = Credential::new(response.access_token);
        *self.credential.write() = credential.clone();
        info!("Access token refreshed");
        Ok(credential)
    }
}
