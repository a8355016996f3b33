//! Smoke tests against a running API server.
//!
//! These tests require:
//! - A migrated and seeded database (`tw-cli migrate && tw-cli seed`)
//! - The server running (`cargo run -p tradewind-api`)
//!
//! `API_BASE_URL` defaults to `http://localhost:3001/api`.

#![allow(clippy::unwrap_used)]

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

fn base_url() -> String {
    std::env::var("API_BASE_URL").unwrap_or_else(|_| "http://localhost:3001/api".to_owned())
}

fn server_root() -> String {
    let base = base_url();
    let parsed = reqwest::Url::parse(&base).unwrap();
    format!("{}://{}", parsed.scheme(), parsed.authority())
}

async fn json_of(response: reqwest::Response) -> (StatusCode, Value) {
    let status = response.status();
    (status, response.json().await.unwrap())
}

async fn login(client: &Client, email: &str, password: &str) -> String {
    let (status, body) = json_of(
        client
            .post(format!("{}/auth/login", base_url()))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["data"]["accessToken"].as_str().unwrap().to_owned()
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_health() {
    let response = Client::new()
        .get(format!("{}/health", server_root()))
        .send()
        .await
        .unwrap();
    let (status, body) = json_of(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_public_catalog_is_paginated() {
    let (status, body) = json_of(
        Client::new()
            .get(format!("{}/products?page=1&limit=2", base_url()))
            .send()
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["data"].as_array().unwrap().len() <= 2);
    assert_eq!(body["pagination"]["limit"], 2);
    assert!(body["data"]
        .as_array()
        .unwrap()
        .iter()
        .all(|p| p["status"] == "active"));
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_bad_login_is_generic() {
    let (status, body) = json_of(
        Client::new()
            .post(format!("{}/auth/login", base_url()))
            .json(&json!({ "email": "nobody@example.com", "password": "wrong-password" }))
            .send()
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid email or password");
}

#[tokio::test]
#[ignore = "Requires running API server and seeded demo data"]
async fn test_customer_cannot_create_category() {
    let client = Client::new();
    let token = login(&client, "customer@ecommerce.com", "Customer123!").await;

    let (status, body) = json_of(
        client
            .post(format!("{}/categories", base_url()))
            .bearer_auth(&token)
            .json(&json!({ "name": "Forbidden Goods" }))
            .send()
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
}

#[tokio::test]
#[ignore = "Requires running API server and seeded demo data"]
async fn test_profile_round_trip() {
    let client = Client::new();
    let token = login(&client, "seller@ecommerce.com", "Seller123!").await;

    let (status, body) = json_of(
        client
            .get(format!("{}/auth/profile", base_url()))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "seller@ecommerce.com");
    assert_eq!(body["data"]["role"], "seller");
    assert!(body["data"].get("passwordHash").is_none());
}
