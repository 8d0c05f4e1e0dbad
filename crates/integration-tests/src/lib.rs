//! Shared fixtures for the black-box tests in `tests/`.

use std::net::SocketAddr;
use std::sync::Arc;

use domains::{Identity, IngredientInput, PostDraft, StepInput, UserId};
use fake::faker::lorem::en::{Sentence, Word};
use fake::Fake;
use secrecy::SecretString;
use services::{CreatePost, Repos, ServiceSettings, Services};
use storage_adapters::InMemoryStore;

pub const ISSUER: &str = "cookbook-auth";
pub const SECRET: &str = "integration-secret-0123456789abcdef";

pub fn identity(id: i64, username: &str) -> Identity {
    Identity {
        user_id: UserId(id),
        username: username.to_string(),
    }
}

/// Services over a fresh in-memory store.
pub fn memory_services() -> (Arc<InMemoryStore>, Services) {
    let store = Arc::new(InMemoryStore::new());
    let services = Services::new(Repos::from_store(store.clone()), ServiceSettings::default());
    (store, services)
}

/// Provisions a user (and their default boxes) and returns their id.
pub async fn provisioned(services: &Services, id: i64, username: &str) -> UserId {
    services
        .users
        .provision(&identity(id, username), None)
        .await
        .expect("provision user")
        .id
}

/// A valid draft with filler text for everything the test does not care about.
pub fn fake_draft() -> PostDraft {
    let title: String = Sentence(2..5).fake();
    let ingredient: String = Word().fake();
    PostDraft {
        title: Some(title.trim_end_matches('.').to_string()),
        self_rating: Some((1..6).fake::<i64>()),
        ingredients: vec![IngredientInput {
            quantity: Some("1".into()),
            unit: Some("cup".into()),
            name: Some(ingredient),
        }],
        steps: vec![StepInput {
            body: Some(Sentence(3..8).fake()),
        }],
        ..Default::default()
    }
}

/// An `original` post with fake content.
pub fn original_post() -> CreatePost {
    CreatePost {
        draft: fake_draft(),
        ..Default::default()
    }
}

pub fn secret() -> SecretString {
    SecretString::from(SECRET.to_string())
}

pub fn issuer() -> auth_adapters::JwtIssuer {
    auth_adapters::JwtIssuer::new(&secret(), ISSUER, chrono::Duration::minutes(10))
}

pub fn token_for(id: i64, username: &str) -> String {
    issuer().issue(&identity(id, username)).expect("issue token")
}

/// The full router over an in-memory store.
#[cfg(feature = "web-axum")]
pub fn app() -> axum::Router {
    let (_, services) = memory_services();
    let verifier = Arc::new(auth_adapters::JwtVerifier::new(&secret(), ISSUER));
    api_adapters::router(api_adapters::AppState::new(services, verifier), &[])
}

/// Serves [`app`] on an ephemeral local port and returns its base URL.
#[cfg(feature = "web-axum")]
pub async fn spawn_server() -> String {
    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app()).await;
    });
    format!("http://{addr}/")
}
