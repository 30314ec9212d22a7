//! Account listing.

#![allow(clippy::unwrap_used)]

use bookshelf_core::AccountId;
use bookshelf_integration_tests::{TestApp, body};
use bookshelf_server::db::Store;
use reqwest::StatusCode;

#[tokio::test]
async fn test_users_index_filters_by_status_and_search() {
    let app = TestApp::spawn().await;
    let ada = app.client();
    let me = app.register(&ada, "Ada Lovelace", "ada@example.com").await;
    app.register(&app.client(), "Grace Hopper", "grace@example.com")
        .await;
    app.register(&app.client(), "Alan Turing", "alan@example.org")
        .await;

    let id = AccountId::new(i32::try_from(me["id"].as_i64().unwrap()).unwrap());
    app.store
        .mark_email_verified(id, chrono::Utc::now())
        .await
        .unwrap();

    let resp = ada.get(app.url("/users")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body(resp).await["users"]["meta"]["total"], 3);

    let resp = ada
        .get(app.url("/users?status=verified"))
        .send()
        .await
        .unwrap();
    let body_json = body(resp).await;
    assert_eq!(body_json["users"]["meta"]["total"], 1);
    assert_eq!(body_json["users"]["data"][0]["name"], "Ada Lovelace");
    assert_eq!(body_json["filters"]["status"], "verified");

    let resp = ada
        .get(app.url("/users?status=unverified&search=EXAMPLE.ORG"))
        .send()
        .await
        .unwrap();
    let body_json = body(resp).await;
    assert_eq!(body_json["users"]["meta"]["total"], 1);
    assert_eq!(body_json["users"]["data"][0]["email"], "alan@example.org");

    // Unknown status values are ignored.
    let resp = ada.get(app.url("/users?status=banned")).send().await.unwrap();
    assert_eq!(body(resp).await["users"]["meta"]["total"], 3);
}

#[tokio::test]
async fn test_users_show() {
    let app = TestApp::spawn().await;
    let ada = app.client();
    let me = app.register(&ada, "Ada", "ada@example.com").await;

    let resp = ada
        .get(app.url(&format!("/users/{}", me["id"])))
        .send()
        .await
        .unwrap();
    assert_eq!(body(resp).await["data"]["email"], "ada@example.com");

    let resp = ada.get(app.url("/users/9999")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
