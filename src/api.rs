use std::sync::{Arc, RwLock};

use log::{debug, error};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::error::{ApiError, ApiResult};
use crate::models::{
    Chapter, ChapterId, Comment, CommentId, Credentials, LoginResponse, Manga, MangaId,
    PersonalEntry, PersonalUpdate, ReadingStatus, User,
};

pub const RECOMMENDATION_COUNT: usize = 5;

/// Thin wrapper over the manga REST API. Cheap to clone; clones share the token.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("rmanga/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base_url: format!("{}/api", base_url.trim_end_matches('/')),
            token: Arc::new(RwLock::new(token)),
        }
    }

    pub fn set_token(&self, token: Option<String>) {
        if let Ok(mut slot) = self.token.write() {
            *slot = token;
        }
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|t| t.clone())
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, endpoint);
        let builder = self.http.request(method, url);
        match self.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ApiResult<T> {
        let response = builder.send().await.map_err(|e| {
            error!("API request failed: {e}");
            ApiError::from(e)
        })?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let err = ApiError::from_response(status, &body);
            error!("API error {status}: {err}");
            if matches!(err, ApiError::Unauthorized) {
                self.set_token(None);
            }
            return Err(err);
        }
        debug!("API {status}, {} bytes", body.len());
        let body = if body.trim().is_empty() { "null" } else { body.as_str() };
        Ok(serde_json::from_str(body)?)
    }

    pub async fn login(&self, credentials: &Credentials) -> ApiResult<String> {
        let response: LoginResponse = self
            .send(self.request(Method::POST, "/auth/login").json(credentials))
            .await?;
        self.set_token(Some(response.access_token.clone()));
        Ok(response.access_token)
    }

    pub async fn current_user(&self) -> ApiResult<User> {
        self.send(self.request(Method::GET, "/usuarios/me")).await
    }

    pub async fn mangas(&self, title: Option<&str>) -> ApiResult<Vec<Manga>> {
        let mut builder = self.request(Method::GET, "/mangas/");
        if let Some(title) = title.filter(|t| !t.is_empty()) {
            builder = builder.query(&[("titulo", title)]);
        }
        self.send(builder).await
    }

    pub async fn manga_detail(&self, id: MangaId) -> ApiResult<Manga> {
        self.send(self.request(Method::GET, &format!("/mangas/{id}")))
            .await
    }

    pub async fn chapter_pages(&self, chapter_id: ChapterId, manga_id: MangaId) -> ApiResult<Chapter> {
        self.send(self.request(
            Method::GET,
            &format!("/capitulos/{chapter_id}/manga/{manga_id}"),
        ))
        .await
    }

    pub async fn comments(&self, manga_id: MangaId) -> ApiResult<Vec<Comment>> {
        self.send(self.request(Method::GET, &format!("/comentarios/{manga_id}")))
            .await
    }

    pub async fn create_comment(
        &self,
        manga_id: MangaId,
        text: &str,
        parent: Option<CommentId>,
    ) -> ApiResult<serde_json::Value> {
        let mut builder = self
            .request(Method::POST, &format!("/comentarios/{manga_id}"))
            .query(&[("texto", text)]);
        if let Some(parent) = parent {
            builder = builder.query(&[("id_comentario_padre", parent)]);
        }
        self.send(builder).await
    }

    pub async fn delete_comment(&self, comment_id: CommentId) -> ApiResult<serde_json::Value> {
        self.send(self.request(Method::DELETE, &format!("/comentarios/{comment_id}")))
            .await
    }

    pub async fn like_comment(&self, comment_id: CommentId) -> ApiResult<serde_json::Value> {
        self.send(self.request(Method::PUT, &format!("/comentarios/{comment_id}/like")))
            .await
    }

    pub async fn personal_list(&self) -> ApiResult<Vec<PersonalEntry>> {
        self.send(self.request(Method::GET, "/personal/")).await
    }

    pub async fn add_to_personal_list(
        &self,
        manga_id: MangaId,
        status: ReadingStatus,
    ) -> ApiResult<serde_json::Value> {
        self.send(
            self.request(Method::POST, &format!("/personal/{manga_id}"))
                .query(&[("estado_lectura", status.as_query())]),
        )
        .await
    }

    pub async fn update_personal_entry(
        &self,
        manga_id: MangaId,
        update: &PersonalUpdate,
    ) -> ApiResult<serde_json::Value> {
        self.send(
            self.request(Method::PUT, &format!("/personal/{manga_id}"))
                .json(update),
        )
        .await
    }

    pub async fn remove_from_personal_list(&self, manga_id: MangaId) -> ApiResult<serde_json::Value> {
        self.send(self.request(Method::DELETE, &format!("/personal/{manga_id}")))
            .await
    }

    pub async fn recommendations(&self, count: usize) -> ApiResult<Vec<Manga>> {
        self.send(
            self.request(Method::GET, "/personal/recomendaciones")
                .query(&[("cantidad", count)]),
        )
        .await
    }
}
