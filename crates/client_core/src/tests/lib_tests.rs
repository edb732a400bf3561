use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use super::*;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use shared::domain::Rating;
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct ServerState {
    queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
    posted_reviews: Arc<Mutex<Vec<Value>>>,
}

fn app_json(id: i64, name: &str, category: &str, rating: f64) -> Value {
    json!({
        "id": id,
        "name": name,
        "developer": "Studio",
        "category": category,
        "age_rating": "12+",
        "description": "Test app.",
        "icon_url": null,
        "rating": rating,
        "version": "1.0.0",
        "size": "40 MB",
        "price": "Free",
        "last_update": "2024-01-02",
        "screenshots": []
    })
}

async fn list_apps(
    State(state): State<ServerState>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let category = query.get("category").cloned();
    state.queries.lock().expect("lock").push(query);
    let apps = match category.as_deref() {
        Some("Фото и видео") => json!([app_json(9, "Video Editor Pro", "Фото и видео", 4.7)]),
        Some(_) => json!([]),
        None => json!([
            app_json(1, "Weather Now", "Tools", 4.2),
            app_json(2, "Budget Manager", "Finance", 4.6),
        ]),
    };
    Json(apps)
}

async fn get_app(Path(id): Path<i64>) -> (StatusCode, Json<Value>) {
    if id == 1 {
        (StatusCode::OK, Json(app_json(1, "Weather Now", "Tools", 4.2)))
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({"detail": "Application not found"})),
        )
    }
}

async fn featured() -> Json<Value> {
    Json(json!([
        app_json(3, "Travel Guide", "Travel", 4.8),
        app_json(2, "Budget Manager", "Finance", 4.6),
        app_json(1, "Weather Now", "Tools", 4.2),
    ]))
}

async fn search(
    State(state): State<ServerState>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    state.queries.lock().expect("lock").push(query);
    Json(json!([app_json(3, "Travel Guide", "Travel", 4.8)]))
}

async fn categories() -> Json<Value> {
    Json(json!(["Tools", "Finance"]))
}

async fn reviews(Path(id): Path<i64>) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": [
            {"id": 12, "app_id": id, "author": "Ann", "rating": 5, "text": "great", "likes": 3,
             "created_at": "Tue, 02 Jan 2024 10:00:00 GMT", "date": "02.01.2024"},
            {"id": 11, "app_id": id, "author": "Bo", "rating": 2, "text": "slow", "likes": 0}
        ]
    }))
}

async fn rating(Path(_id): Path<i64>) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "average_rating": 3.5,
            "reviews_count": 2,
            "rating_distribution": {"5": 1, "4": 0, "3": 0, "2": 1, "1": 0}
        }
    }))
}

async fn add_review(
    State(state): State<ServerState>,
    Path(_id): Path<i64>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.posted_reviews.lock().expect("lock").push(body.clone());
    (
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": {"id": 40, "author": body["author"], "rating": body["rating"], "text": body["text"], "likes": 0}
        })),
    )
}

async fn like(Path(id): Path<i64>) -> (StatusCode, Json<Value>) {
    if id == 12 {
        (StatusCode::OK, Json(json!({"success": true, "data": {"likes": 4}})))
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({"success": false, "error": "Review not found"})),
        )
    }
}

async fn spawn_catalog_server() -> anyhow::Result<(String, ServerState)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = ServerState::default();
    let app = Router::new()
        .route("/api/apps", get(list_apps))
        .route("/api/apps/:id", get(get_app))
        .route("/api/apps/:id/reviews", get(reviews).post(add_review))
        .route("/api/apps/:id/rating", get(rating))
        .route("/api/featured", get(featured))
        .route("/api/search", get(search))
        .route("/api/categories", get(categories))
        .route("/api/reviews/:id/like", post(like))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), state))
}

async fn client() -> (HttpCatalogClient, ServerState) {
    let (url, state) = spawn_catalog_server().await.expect("server");
    let client = HttpCatalogClient::new(&url, Duration::from_secs(5)).expect("client");
    (client, state)
}

#[test]
fn base_url_gains_trailing_slash() {
    let client = HttpCatalogClient::new("http://store.local/catalog", Duration::from_secs(1))
        .expect("client");
    assert_eq!(client.base_url().as_str(), "http://store.local/catalog/");
    assert_eq!(
        client.endpoint("api/apps").expect("endpoint").as_str(),
        "http://store.local/catalog/api/apps"
    );
}

#[test]
fn rejects_unparseable_base_url() {
    let err = HttpCatalogClient::new("not a url", Duration::from_secs(1))
        .err()
        .expect("should fail");
    assert!(matches!(err, CatalogError::Url(_)));
}

#[test]
fn decode_body_unwraps_enveloped_rating_summary() {
    let summary: RatingSummary = decode_body(
        br#"{"success": true, "data": {"average_rating": 4.0, "reviews_count": 3, "rating_distribution": {"5": 2, "2": 1}}}"#,
    )
    .expect("summary");
    assert_eq!(summary.reviews_count, 3);
    assert_eq!(summary.rating_distribution.get(&5), Some(&2));
}

#[test]
fn decode_body_accepts_total_reviews_summary() {
    let summary: RatingSummary =
        decode_body(br#"{"success": true, "data": {"average_rating": 4.5, "total_reviews": 12}}"#)
            .expect("summary");
    assert_eq!(summary.average_rating, 4.5);
    assert_eq!(summary.reviews_count, 12);
}

#[test]
fn decode_body_reads_bare_bodies() {
    let item: CatalogItem =
        decode_body(br#"{"id": 1, "name": "Maps", "category": "Navigation", "rating": null}"#)
            .expect("item");
    assert_eq!(item.name, "Maps");
    assert_eq!(item.rating, 0.0);
}

#[test]
fn decode_body_surfaces_failed_envelope() {
    let err = decode_body::<LikeResponse>(br#"{"success": false, "error": "Review not found"}"#)
        .expect_err("failed envelope");
    match err {
        CatalogError::Api(api) => assert_eq!(api.message, "Review not found"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn decode_body_keeps_reviews_with_null_author() {
    let reviews: Vec<Review> = decode_body(
        br#"{"success": true, "data": [{"id": 5, "author": null, "rating": 4, "text": "ok"}]}"#,
    )
    .expect("reviews");
    assert_eq!(reviews[0].author, "Anonymous");
}

#[tokio::test]
async fn fetches_bare_item_lists() {
    let (client, _) = client().await;
    let items = client.fetch_items().await.expect("items");
    assert_eq!(items.len(), 2);
    assert_eq!(items[1].name, "Budget Manager");
    assert_eq!(items[1].size.as_deref(), Some("40 MB"));
}

#[tokio::test]
async fn fetch_item_maps_not_found_detail() {
    let (client, _) = client().await;
    assert_eq!(client.fetch_item(ItemId(1)).await.expect("item").id, ItemId(1));

    let err = client.fetch_item(ItemId(5)).await.expect_err("missing");
    match err {
        CatalogError::Status { status, code, detail } => {
            assert_eq!(status, 404);
            assert_eq!(code, ErrorCode::NotFound);
            assert_eq!(detail, "Application not found");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn featured_is_truncated_client_side() {
    let (client, _) = client().await;
    let featured = client.fetch_featured(2).await.expect("featured");
    let ids: Vec<i64> = featured.iter().map(|item| item.id.0).collect();
    assert_eq!(ids, vec![3, 2]);
}

#[tokio::test]
async fn category_and_search_are_query_encoded() {
    let (client, state) = client().await;
    let items = client.fetch_by_category("Фото и видео").await.expect("category");
    assert_eq!(items.len(), 1);

    client.search("travel & maps").await.expect("search");

    let queries = state.queries.lock().expect("lock").clone();
    assert_eq!(queries[0].get("category").map(String::as_str), Some("Фото и видео"));
    assert_eq!(queries[1].get("q").map(String::as_str), Some("travel & maps"));
}

#[tokio::test]
async fn categories_accept_plain_strings() {
    let (client, _) = client().await;
    let categories = client.fetch_categories().await.expect("categories");
    assert_eq!(categories[0].name, "Tools");
}

#[tokio::test]
async fn enveloped_reviews_and_rating_are_unwrapped() {
    let (client, _) = client().await;
    let reviews = client.fetch_reviews(ItemId(3)).await.expect("reviews");
    assert_eq!(reviews.len(), 2);
    assert_eq!(reviews[0].comment, "great");
    assert_eq!(reviews[0].likes, 3);
    assert!(reviews[0].created_at.is_some());

    let summary = client.fetch_rating_summary(ItemId(3)).await.expect("rating");
    assert_eq!(summary.reviews_count, 2);
    assert_eq!(summary.rating_distribution.get(&2), Some(&1));
}

#[tokio::test]
async fn submit_review_posts_json_body() {
    let (client, state) = client().await;
    let created = client
        .submit_review(
            ItemId(3),
            NewReview {
                author: "Mila".to_string(),
                rating: Rating::new(4).expect("rating"),
                text: "Works offline".to_string(),
            },
        )
        .await
        .expect("submit");

    assert_eq!(created.id, ReviewId(40));
    assert_eq!(created.comment, "Works offline");
    let posted = state.posted_reviews.lock().expect("lock").clone();
    assert_eq!(posted[0]["rating"], json!(4));
}

#[tokio::test]
async fn like_returns_confirmed_count_or_service_error() {
    let (client, _) = client().await;
    assert_eq!(client.like_review(ReviewId(12)).await.expect("like"), 4);

    let err = client.like_review(ReviewId(99)).await.expect_err("missing");
    assert!(matches!(
        err,
        CatalogError::Status { status: 404, ref detail, .. } if detail == "Review not found"
    ));
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let client = HttpCatalogClient::new(&format!("http://{addr}"), Duration::from_secs(2))
        .expect("client");
    let err = client.fetch_items().await.expect_err("offline");
    assert!(matches!(err, CatalogError::Transport(_)));
}
