//! # CookbookClient
//!
//! Every call has a request timeout. Idempotent reads are retried once,
//! immediately, when the first attempt times out or cannot connect; writes
//! are never retried.

use std::time::Duration;

use api_adapters::{ApiResponse, ErrorBody};
use domains::{
    BoxId, BoxInput, BoxMembership, Comment, CommentInput, CommentThread, PostId, PostPatch,
    Profile, RecipeBox, RecipePost, UserId,
};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use services::{CookPreview, CookRequest, CreatePost, ParsedIngredient, PostView};
use tracing::{debug, warn};
use url::Url;

use crate::error::ClientError;
use crate::optimistic::OptimisticToggle;
use crate::session::Session;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct CookbookClient {
    http: reqwest::Client,
    base: Url,
    session: Session,
}

impl CookbookClient {
    /// `base_url` is the server root, e.g. `http://localhost:8080/`.
    pub fn new(base_url: &str, session: Session, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base: Url::parse(base_url)?,
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base.join(path)?)
    }

    fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder, ClientError> {
        let token = self.session.bearer().ok_or(ClientError::NoSession)?;
        Ok(builder.bearer_auth(token))
    }

    fn get(&self, url: Url, authenticated: bool) -> Result<RequestBuilder, ClientError> {
        let builder = self.http.get(url);
        if authenticated {
            self.authorized(builder)
        } else {
            Ok(builder)
        }
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        url: Url,
        authenticated: bool,
    ) -> Result<T, ClientError> {
        let response = match self.get(url.clone(), authenticated)?.send().await {
            Ok(response) => response,
            Err(err) if err.is_timeout() || err.is_connect() => {
                warn!(%url, error = %err, "read failed, retrying once");
                self.get(url, authenticated)?.send().await?
            }
            Err(err) => return Err(err.into()),
        };
        unwrap_envelope(response).await
    }

    async fn read<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.fetch(self.url(path)?, false).await
    }

    async fn read_authorized<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.fetch(self.url(path)?, true).await
    }

    async fn write<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, ClientError> {
        let mut builder = self.authorized(self.http.request(method, self.url(path)?))?;
        if let Some(body) = body {
            builder = builder.json(body);
        }
        Ok(builder.send().await?)
    }

    // -- posts ------------------------------------------------------------

    pub async fn feed(&self, limit: u32, offset: u32) -> Result<Vec<RecipePost>, ClientError> {
        self.read(&format!("api/posts/feed?limit={limit}&offset={offset}")).await
    }

    pub async fn get_post(&self, id: PostId) -> Result<PostView, ClientError> {
        self.read(&format!("api/posts/{id}")).await
    }

    pub async fn create_post(&self, post: &CreatePost) -> Result<RecipePost, ClientError> {
        unwrap_envelope(self.write(Method::POST, "api/posts/recipe", Some(post)).await?).await
    }

    pub async fn cook_preview(&self, source: PostId) -> Result<CookPreview, ClientError> {
        self.read(&format!("api/posts/recipe/cook/{source}")).await
    }

    pub async fn cook(
        &self,
        source: PostId,
        request: &CookRequest,
    ) -> Result<RecipePost, ClientError> {
        let path = format!("api/posts/recipe/cook/{source}");
        unwrap_envelope(self.write(Method::POST, &path, Some(request)).await?).await
    }

    pub async fn update_post(
        &self,
        id: PostId,
        patch: &PostPatch,
    ) -> Result<RecipePost, ClientError> {
        let path = format!("api/posts/{id}");
        unwrap_envelope(self.write(Method::PATCH, &path, Some(patch)).await?).await
    }

    pub async fn delete_post(&self, id: PostId) -> Result<(), ClientError> {
        let path = format!("api/posts/{id}");
        expect_empty(self.write::<()>(Method::DELETE, &path, None).await?).await
    }

    // -- boxes ------------------------------------------------------------

    pub async fn my_boxes(&self) -> Result<Vec<RecipeBox>, ClientError> {
        self.read_authorized("api/boxes").await
    }

    pub async fn create_box(&self, input: &BoxInput) -> Result<RecipeBox, ClientError> {
        unwrap_envelope(self.write(Method::POST, "api/boxes", Some(input)).await?).await
    }

    /// Saves `post` into `box_id`. A repeat save answers 409 with the existing
    /// membership, which is returned as success.
    pub async fn save_to_box(
        &self,
        post: PostId,
        box_id: BoxId,
    ) -> Result<BoxMembership, ClientError> {
        let body = json!({ "box_id": box_id });
        let path = format!("api/posts/{post}/save");
        let response = self.write(Method::POST, &path, Some(&body)).await?;
        if response.status() == StatusCode::CONFLICT {
            debug!(%post, %box_id, "already saved");
            let envelope: ApiResponse<BoxMembership> = response.json().await?;
            return Ok(envelope.data);
        }
        unwrap_envelope(response).await
    }

    pub async fn unsave(&self, post: PostId, box_id: BoxId) -> Result<(), ClientError> {
        let path = format!("api/posts/{post}/save/{box_id}");
        expect_empty(self.write::<()>(Method::DELETE, &path, None).await?).await
    }

    // -- comments ---------------------------------------------------------

    pub async fn comments(&self, post: PostId) -> Result<Vec<CommentThread>, ClientError> {
        self.read(&format!("api/posts/{post}/comments")).await
    }

    pub async fn comment(
        &self,
        post: PostId,
        input: &CommentInput,
    ) -> Result<Comment, ClientError> {
        let path = format!("api/posts/{post}/comments");
        unwrap_envelope(self.write(Method::POST, &path, Some(input)).await?).await
    }

    // -- users ------------------------------------------------------------

    pub async fn me(&self) -> Result<Profile, ClientError> {
        self.read_authorized("api/users/me").await
    }

    pub async fn profile(&self, user: UserId) -> Result<Profile, ClientError> {
        self.read(&format!("api/users/{user}")).await
    }

    /// Returns whether a new follow was recorded.
    pub async fn follow(&self, user: UserId) -> Result<bool, ClientError> {
        let path = format!("api/users/{user}/follow");
        let state: FollowState =
            unwrap_envelope(self.write::<()>(Method::POST, &path, None).await?).await?;
        Ok(state.changed)
    }

    pub async fn unfollow(&self, user: UserId) -> Result<bool, ClientError> {
        let path = format!("api/users/{user}/follow");
        let state: FollowState =
            unwrap_envelope(self.write::<()>(Method::DELETE, &path, None).await?).await?;
        Ok(state.changed)
    }

    // -- search and helpers -----------------------------------------------

    pub async fn search_recipes(&self, text: &str) -> Result<Vec<RecipePost>, ClientError> {
        let mut url = self.url("api/search/recipes")?;
        url.query_pairs_mut().append_pair("q", text);
        self.fetch(url, false).await
    }

    pub async fn parse_ingredients(
        &self,
        lines: &[String],
    ) -> Result<Vec<ParsedIngredient>, ClientError> {
        let url = self.url("api/parse/ingredients")?;
        let response = self.http.post(url).json(&json!({ "lines": lines })).send().await?;
        unwrap_envelope(response).await
    }

    // -- optimistic toggles -----------------------------------------------

    /// Flips the local "following" view, then follows or unfollows.
    pub async fn toggle_follow(
        &self,
        view: &OptimisticToggle<bool>,
        user: UserId,
    ) -> Result<bool, ClientError> {
        let next = !view.current();
        view.apply(next, || async move {
            if next {
                self.follow(user).await?;
            } else {
                self.unfollow(user).await?;
            }
            Ok(next)
        })
        .await
    }

    /// Flips the local "saved" view for one box, then saves or unsaves.
    pub async fn toggle_saved(
        &self,
        view: &OptimisticToggle<bool>,
        post: PostId,
        box_id: BoxId,
    ) -> Result<bool, ClientError> {
        let next = !view.current();
        view.apply(next, || async move {
            if next {
                self.save_to_box(post, box_id).await?;
            } else {
                self.unsave(post, box_id).await?;
            }
            Ok(next)
        })
        .await
    }
}

#[derive(serde::Deserialize)]
struct FollowState {
    changed: bool,
}

async fn error_from(response: Response) -> ClientError {
    let status = response.status().as_u16();
    let text = match response.text().await {
        Ok(text) => text,
        Err(err) => return err.into(),
    };
    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => ClientError::Api {
            status,
            code: body.code,
            message: body.error,
        },
        Err(_) => ClientError::Api {
            status,
            code: String::new(),
            message: text,
        },
    }
}

async fn unwrap_envelope<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    if !response.status().is_success() {
        return Err(error_from(response).await);
    }
    let bytes = response.bytes().await?;
    let envelope: ApiResponse<T> = serde_json::from_slice(&bytes)?;
    Ok(envelope.data)
}

async fn expect_empty(response: Response) -> Result<(), ClientError> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(error_from(response).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn authenticated_calls_fail_locally_without_a_session() {
        let client =
            CookbookClient::new("http://127.0.0.1:9/", Session::new(), Duration::from_millis(50))
                .unwrap();
        let err = client.my_boxes().await.unwrap_err();
        assert!(matches!(err, ClientError::NoSession));
        let err = client.save_to_box(PostId(1), BoxId(1)).await.unwrap_err();
        assert!(matches!(err, ClientError::NoSession));
    }

    #[test]
    fn paths_join_onto_the_base() {
        let client =
            CookbookClient::new("http://localhost:8080/", Session::new(), DEFAULT_TIMEOUT).unwrap();
        assert_eq!(
            client.url("api/posts/7").unwrap().as_str(),
            "http://localhost:8080/api/posts/7"
        );
    }
}
