//! Registration, login and the signed-in account's profile.

#![allow(clippy::unwrap_used)]

use bookshelf_core::BookId;
use bookshelf_integration_tests::{BookForm, PASSWORD, TestApp, body};
use bookshelf_server::db::Store;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn test_register_signs_in() {
    let app = TestApp::spawn().await;
    let client = app.client();

    let account = app.register(&client, "Ada Lovelace", "Ada@Example.com").await;
    assert_eq!(account["email"], "Ada@Example.com");
    assert_eq!(account["initials"], "AL");
    assert_eq!(account["status"], "unverified");
    assert!(account.get("password_hash").is_none());

    let resp = client.get(app.url("/auth/me")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body(resp).await["data"]["id"], account["id"]);
}

#[tokio::test]
async fn test_register_rejects_taken_email_and_short_password() {
    let app = TestApp::spawn().await;
    app.register(&app.client(), "Ada", "ada@example.com").await;

    let resp = app
        .client()
        .post(app.url("/auth/register"))
        .json(&json!({
            "name": "Impostor",
            "email": "ADA@example.com",
            "password": "short",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body(resp).await;
    assert!(body["errors"]["password"].is_array());
}

#[tokio::test]
async fn test_login_and_logout() {
    let app = TestApp::spawn().await;
    app.register(&app.client(), "Ada", "ada@example.com").await;

    let client = app.client();
    let resp = client
        .post(app.url("/auth/login"))
        .json(&json!({ "email": "ada@example.com", "password": "wrong-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body(resp).await["errors"]["email"][0],
        "These credentials do not match our records."
    );

    let resp = client
        .post(app.url("/auth/login"))
        .json(&json!({ "email": "ada@example.com", "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client.get(app.url("/books")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client.post(app.url("/auth/logout")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = client.get(app.url("/books")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_routes_require_session() {
    let app = TestApp::spawn().await;
    let client = app.client();

    for path in ["/books", "/books/authors", "/books/1", "/users", "/auth/me"] {
        let resp = client.get(app.url(path)).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{path}");
        assert_eq!(body(resp).await["message"], "Unauthenticated.");
    }
}

#[tokio::test]
async fn test_update_profile() {
    let app = TestApp::spawn().await;
    let client = app.client();
    app.register(&client, "Ada", "ada@example.com").await;
    app.register(&app.client(), "Grace", "grace@example.com").await;

    let resp = client
        .put(app.url("/auth/me"))
        .json(&json!({ "name": "Ada King", "email": "grace@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let resp = client
        .put(app.url("/auth/me"))
        .json(&json!({ "name": "Ada King", "email": "countess@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let data = body(resp).await["data"].clone();
    assert_eq!(data["name"], "Ada King");
    assert_eq!(data["initials"], "AK");
}

#[tokio::test]
async fn test_deleting_account_removes_its_books() {
    let app = TestApp::spawn().await;
    let ada = app.client();
    let grace = app.client();
    app.register(&ada, "Ada", "ada@example.com").await;
    app.register(&grace, "Grace", "grace@example.com").await;

    let book = app
        .create_book(&ada, BookForm::new("Frankenstein", "Mary Shelley", "5"))
        .await;
    app.create_book(&grace, BookForm::new("Cobol", "Hopper", "4"))
        .await;

    let resp = ada
        .delete(app.url("/auth/me"))
        .json(&json!({ "password": "not-my-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let resp = ada
        .delete(app.url("/auth/me"))
        .json(&json!({ "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let id = BookId::new(i32::try_from(book["id"].as_i64().unwrap()).unwrap());
    assert!(app.store.get_book(id).await.unwrap().is_none());

    let resp = ada.get(app.url("/auth/me")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = grace.get(app.url("/books")).send().await.unwrap();
    assert_eq!(body(resp).await["books"]["meta"]["total"], 1);
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::spawn().await;
    let client = app.client();

    let resp = client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));

    let resp = client.get(app.url("/health/ready")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
