//! Integration tests for Bookshelf.
//!
//! Each test spawns the full application router on an ephemeral port and
//! talks to it over HTTP with `reqwest`, one cookie jar per simulated user.
//!
//! # Running Tests
//!
//! ```bash
//! # In-memory store, no services needed
//! cargo test -p bookshelf-integration-tests
//!
//! # Against PostgreSQL as well
//! TEST_DATABASE_URL=postgres://localhost/bookshelf_test \
//!     cargo test -p bookshelf-integration-tests -- --include-ignored
//! ```

#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::net::SocketAddr;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};
use tempfile::TempDir;

use bookshelf_server::config::CatalogConfig;
use bookshelf_server::db::{MemoryStore, Store};
use bookshelf_server::middleware::session_layer;
use bookshelf_server::state::AppState;

/// Smallest byte string the server accepts as a PNG.
pub const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

/// Password every helper-registered account uses.
pub const PASSWORD: &str = "correct-horse";

/// A running application instance.
pub struct TestApp<S = MemoryStore> {
    pub base_url: String,
    /// Direct handle on the backing store for fixtures and assertions.
    pub store: S,
    storage: TempDir,
    server: tokio::task::JoinHandle<()>,
}

impl TestApp<MemoryStore> {
    /// Spawn the app on a fresh in-memory store.
    pub async fn spawn() -> Self {
        Self::spawn_with(MemoryStore::new()).await
    }
}

impl<S: Store> TestApp<S> {
    /// Spawn the app on `store`, with thumbnails in a temporary directory.
    pub async fn spawn_with(store: S) -> Self {
        let storage = tempfile::tempdir().unwrap();
        let config = CatalogConfig {
            storage_root: storage.path().to_path_buf(),
            ..CatalogConfig::default()
        };

        let state = AppState::new(config, store.clone());
        let sessions = session_layer(tower_sessions::MemoryStore::default(), false);
        let app = bookshelf_server::app(state, sessions);

        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            store,
            storage,
            server,
        }
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// A client with its own cookie jar, i.e. a separate browser.
    #[must_use]
    pub fn client(&self) -> Client {
        Client::builder().cookie_store(true).build().unwrap()
    }

    /// Root directory thumbnails are written to.
    #[must_use]
    pub fn storage_root(&self) -> &std::path::Path {
        self.storage.path()
    }

    /// Register an account on `client` (leaving it signed in) and return
    /// its JSON view.
    pub async fn register(&self, client: &Client, name: &str, email: &str) -> Value {
        let resp = client
            .post(self.url("/auth/register"))
            .json(&json!({
                "name": name,
                "email": email,
                "password": PASSWORD,
                "password_confirmation": PASSWORD,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED, "register {email}");
        body(resp).await["data"].clone()
    }

    /// Create a book and return its JSON view.
    pub async fn create_book(&self, client: &Client, book: BookForm<'_>) -> Value {
        let resp = client
            .post(self.url("/books"))
            .multipart(book.into_form())
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED, "create {}", book.title);
        body(resp).await["data"].clone()
    }
}

impl<S> Drop for TestApp<S> {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// Fields of a book form.
#[derive(Debug, Clone, Copy)]
pub struct BookForm<'a> {
    pub title: &'a str,
    pub author: &'a str,
    pub description: &'a str,
    pub rating: &'a str,
    /// PNG bytes to attach as the thumbnail.
    pub thumbnail: Option<&'a [u8]>,
}

impl<'a> BookForm<'a> {
    #[must_use]
    pub const fn new(title: &'a str, author: &'a str, rating: &'a str) -> Self {
        Self {
            title,
            author,
            description: "A book worth keeping.",
            rating,
            thumbnail: None,
        }
    }

    #[must_use]
    pub const fn with_thumbnail(mut self, bytes: &'a [u8]) -> Self {
        self.thumbnail = Some(bytes);
        self
    }

    #[must_use]
    pub fn into_form(self) -> Form {
        let form = Form::new()
            .text("title", self.title.to_owned())
            .text("author", self.author.to_owned())
            .text("description", self.description.to_owned())
            .text("rating", self.rating.to_owned());
        match self.thumbnail {
            Some(bytes) => form.part(
                "thumbnail",
                Part::bytes(bytes.to_vec())
                    .file_name("cover.png")
                    .mime_str("image/png")
                    .unwrap(),
            ),
            None => form,
        }
    }
}

/// Decode a JSON response body.
pub async fn body(resp: Response) -> Value {
    resp.json().await.unwrap()
}
