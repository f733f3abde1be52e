//! In-process stand-in for the CookMate REST backend.

use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Default)]
pub struct BackendLog {
    pub pantry: Vec<Value>,
    pub deleted: Vec<String>,
    pub favorites: Vec<Value>,
}

#[derive(Deserialize)]
struct UserQuery {
    user: Option<String>,
}

fn recipes() -> Vec<Value> {
    vec![
        json!({
            "id": "tea",
            "name": "Tea",
            "title": "Masala Tea",
            "steps": ["Boil water.", "Add tea leaves.", "Strain."],
            "ingredients": ["water", "tea", "milk"],
            "cuisine": "Indian",
            "time": "10 mins"
        }),
        json!({
            "id": "toast",
            "title": "Toast",
            "steps": ["Toast the bread."],
            "time": 5
        }),
    ]
}

/// Serve the stand-in on an ephemeral port. Returns its base URL.
pub async fn spawn_backend() -> (String, Arc<Mutex<BackendLog>>) {
    let log = Arc::new(Mutex::new(BackendLog::default()));
    let app = Router::new()
        .route("/api/recipes", get(|| async { Json(recipes()) }))
        .route("/api/recipes/{id}", get(recipe))
        .route("/api/voice", post(voice))
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/pantry", get(pantry).post(add_pantry))
        .route("/api/pantry/{id}", delete(delete_pantry))
        .route("/api/favorites", get(favorites).post(add_favorite))
        .with_state(log.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), log)
}

async fn recipe(Path(id): Path<String>) -> impl IntoResponse {
    match recipes().into_iter().find(|r| r["id"] == id.as_str()) {
        Some(r) => (StatusCode::OK, Json(r)),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Recipe not found" })),
        ),
    }
}

async fn voice(Json(body): Json<Value>) -> Json<Value> {
    let text = body["text"].as_str().unwrap_or_default().to_lowercase();
    let response = if text.contains("recipe") {
        "I found 2 recipes: Tea, Toast"
    } else {
        "I can help you find recipes."
    };
    Json(json!({ "response": response }))
}

async fn login(Json(body): Json<Value>) -> impl IntoResponse {
    if body["email"] == "cook@example.com" && body["pass"] == "secret" {
        (
            StatusCode::OK,
            Json(json!({ "success": true, "user": { "email": "cook@example.com" } })),
        )
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "error": "Invalid credentials" })),
        )
    }
}

async fn register(Json(body): Json<Value>) -> impl IntoResponse {
    if body["email"] == "cook@example.com" {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "User already exists" })),
        )
    } else {
        (StatusCode::OK, Json(json!({ "success": true })))
    }
}

async fn pantry(
    State(log): State<Arc<Mutex<BackendLog>>>,
    Query(q): Query<UserQuery>,
) -> Json<Value> {
    if q.user.is_none() {
        return Json(json!([]));
    }
    let items: Vec<Value> = log
        .lock()
        .unwrap()
        .pantry
        .iter()
        .enumerate()
        .map(|(i, item)| {
            json!({ "_id": format!("item-{i}"), "name": item["name"], "expiry": item["expiry"] })
        })
        .collect();
    Json(Value::Array(items))
}

async fn add_pantry(
    State(log): State<Arc<Mutex<BackendLog>>>,
    Query(q): Query<UserQuery>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let mut body = body;
    body["user"] = json!(q.user);
    log.lock().unwrap().pantry.push(body);
    Json(json!({ "message": "Item added" }))
}

async fn delete_pantry(
    State(log): State<Arc<Mutex<BackendLog>>>,
    Path(id): Path<String>,
) -> Json<Value> {
    log.lock().unwrap().deleted.push(id);
    Json(json!({ "message": "Item deleted" }))
}

async fn favorites(
    State(log): State<Arc<Mutex<BackendLog>>>,
    Query(q): Query<UserQuery>,
) -> Json<Value> {
    let user = q.user.unwrap_or_default();
    let items: Vec<Value> = log
        .lock()
        .unwrap()
        .favorites
        .iter()
        .filter(|f| f["user"] == user.as_str())
        .cloned()
        .collect();
    Json(Value::Array(items))
}

async fn add_favorite(
    State(log): State<Arc<Mutex<BackendLog>>>,
    Query(q): Query<UserQuery>,
    Json(body): Json<Value>,
) -> Json<Value> {
    log.lock()
        .unwrap()
        .favorites
        .push(json!({ "user": q.user, "recipeId": body["recipeId"] }));
    Json(json!({ "message": "Favorite added" }))
}
