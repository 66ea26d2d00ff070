//! # API REST
//! src/router/api.rs
//!
//! Endpoints bajo el prefijo `/api`:
//!
//! - `GET /api/users` - lista de usuarios
//! - `POST /api/users` - crear usuario (JSON `{name, email}`)
//! - `GET /api/users/{id}` - usuario puntual
//! - `GET /api/stats` - estadísticas del servidor
//! - `GET /api/docs` - documentación HTML
//!
//! Todas las respuestas llevan los headers CORS
//! `Access-Control-Allow-Origin: *` y
//! `Access-Control-Allow-Credentials: true`. Los bodies usan el envelope
//! `{"success": true, "message": ..., "data": ...}` en éxito y
//! `{"success": false, "error": ..., "code": ...}` en error.

use crate::http::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Usuario del API de ejemplo
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
}

/// Body esperado por POST /api/users
#[derive(Debug, Deserialize)]
struct NewUser {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
}

/// Números del servidor que expone GET /api/stats
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ServerStats {
    pub total_requests: u64,
    pub active_connections: usize,
    pub thread_count: usize,
    pub queue_size: usize,
}

/// Colección de usuarios en memoria
pub struct UserStore {
    users: Mutex<Vec<User>>,
    next_id: AtomicU64,
}

impl UserStore {
    /// Crea el store con los datos de muestra de siempre
    pub fn with_sample_data() -> Self {
        let users = vec![
            User {
                id: 1,
                name: "John Doe".to_string(),
                email: "john.doe@example.com".to_string(),
            },
            User {
                id: 2,
                name: "Jane Smith".to_string(),
                email: "jane.smith@example.com".to_string(),
            },
            User {
                id: 3,
                name: "Alice Johnson".to_string(),
                email: "alice.johnson@example.com".to_string(),
            },
        ];

        Self {
            users: Mutex::new(users),
            next_id: AtomicU64::new(4),
        }
    }

    /// Lista completa de usuarios
    pub fn list(&self) -> Vec<User> {
        self.users.lock().unwrap().clone()
    }

    /// Busca un usuario por id
    pub fn find(&self, id: u64) -> Option<User> {
        self.users.lock().unwrap().iter().find(|u| u.id == id).cloned()
    }

    /// Crea un usuario nuevo y retorna el registro con su id
    pub fn create(&self, name: String, email: String) -> User {
        let user = User {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            name,
            email,
        };
        self.users.lock().unwrap().push(user.clone());
        user
    }
}

/// Envelope de éxito del API
fn success_body(message: &str, data: serde_json::Value) -> String {
    json!({
        "success": true,
        "message": message,
        "data": data,
    })
    .to_string()
}

/// Envelope de error del API
fn error_body(message: &str, code: u16) -> String {
    json!({
        "success": false,
        "error": message,
        "code": code,
    })
    .to_string()
}

fn json_response(status: StatusCode, body: String) -> Response {
    Response::new(status)
        .with_header("Content-Type", "application/json")
        .with_body(&body)
        .with_cors()
}

/// Enruta un request con prefijo `/api` al endpoint correspondiente
pub fn handle_api(request: &Request, users: &UserStore, stats: ServerStats) -> Response {
    let segments: Vec<&str> = request.path().split('/').filter(|s| !s.is_empty()).collect();

    // segments[0] == "api"
    if segments.len() < 2 {
        return json_response(
            StatusCode::BadRequest,
            error_body("Invalid API path", 400),
        );
    }

    match (segments[1], segments.len()) {
        ("docs", 2) => handle_docs(),
        ("users", 2) => handle_users(request, users),
        ("users", 3) => handle_user_by_id(request, users, segments[2]),
        ("stats", 2) => handle_stats(request, stats),
        _ => json_response(
            StatusCode::NotFound,
            error_body("API endpoint not found", 404),
        ),
    }
}

/// GET y POST sobre la colección /api/users
fn handle_users(request: &Request, users: &UserStore) -> Response {
    match request.method() {
        "GET" => {
            let list = users.list();
            let data = serde_json::to_value(&list).unwrap_or_else(|_| json!([]));
            json_response(
                StatusCode::Ok,
                success_body("Users list retrieved", data),
            )
        }
        "POST" => {
            if !request.has_json_content_type() {
                return json_response(
                    StatusCode::BadRequest,
                    error_body("Content-Type must be application/json", 400),
                );
            }

            let parsed: Result<NewUser, _> = serde_json::from_slice(request.body());
            let new_user = match parsed {
                Ok(value) => value,
                Err(_) => {
                    return json_response(
                        StatusCode::BadRequest,
                        error_body("Invalid JSON data", 400),
                    );
                }
            };

            if new_user.name.is_empty() || new_user.email.is_empty() {
                return json_response(
                    StatusCode::BadRequest,
                    error_body("Name and email are required", 400),
                );
            }

            let created = users.create(new_user.name, new_user.email);
            let data = serde_json::to_value(&created).unwrap_or_else(|_| json!({}));
            json_response(
                StatusCode::Created,
                success_body("User created successfully", data),
            )
        }
        _ => json_response(
            StatusCode::MethodNotAllowed,
            error_body("Method not allowed", 405),
        ),
    }
}

/// GET /api/users/{id}
fn handle_user_by_id(request: &Request, users: &UserStore, raw_id: &str) -> Response {
    if request.method() != "GET" {
        return json_response(
            StatusCode::MethodNotAllowed,
            error_body("Method not allowed", 405),
        );
    }

    let id: u64 = match raw_id.parse() {
        Ok(value) => value,
        Err(_) => {
            return json_response(
                StatusCode::NotFound,
                error_body("User not found", 404),
            );
        }
    };

    match users.find(id) {
        Some(user) => {
            let data = serde_json::to_value(&user).unwrap_or_else(|_| json!({}));
            json_response(StatusCode::Ok, success_body("User data retrieved", data))
        }
        None => json_response(StatusCode::NotFound, error_body("User not found", 404)),
    }
}

/// GET /api/stats
fn handle_stats(request: &Request, stats: ServerStats) -> Response {
    if request.method() != "GET" {
        return json_response(
            StatusCode::MethodNotAllowed,
            error_body("Method not allowed", 405),
        );
    }

    let data = serde_json::to_value(stats).unwrap_or_else(|_| json!({}));
    json_response(StatusCode::Ok, success_body("Server statistics", data))
}

/// GET /api/docs
fn handle_docs() -> Response {
    let docs_html = r#"<!DOCTYPE html>
<html>
<head>
    <title>RedUnix Multi-Protocol Server API</title>
    <style>
        body { font-family: Arial, sans-serif; margin: 40px; line-height: 1.6; }
        .endpoint { background: #f5f5f5; padding: 15px; margin: 10px 0; border-radius: 5px; }
        .method { font-weight: bold; color: #2196F3; }
        .method.post { color: #4CAF50; }
        .url { font-family: monospace; background: #e8e8e8; padding: 5px; }
    </style>
</head>
<body>
    <h1>RedUnix Multi-Protocol Server API</h1>
    <p>Documentación del API REST del servidor.</p>

    <h2>Estadísticas</h2>
    <div class="endpoint">
        <span class="method">GET</span> <span class="url">/api/stats</span>
        <p>Estadísticas del servidor en tiempo real</p>
    </div>

    <h2>Usuarios</h2>
    <div class="endpoint">
        <span class="method">GET</span> <span class="url">/api/users</span>
        <p>Lista de usuarios</p>
    </div>
    <div class="endpoint">
        <span class="method post">POST</span> <span class="url">/api/users</span>
        <p>Crear usuario: <code>{"name": "...", "email": "..."}</code></p>
    </div>
    <div class="endpoint">
        <span class="method">GET</span> <span class="url">/api/users/{id}</span>
        <p>Usuario puntual por id</p>
    </div>

    <p><a href="/">Inicio</a> | <a href="/dashboard">Dashboard</a></p>
</body>
</html>
"#;

    Response::new(StatusCode::Ok)
        .with_header("Content-Type", "text/html")
        .with_body(docs_html)
        .with_cors()
}

/// Respuesta a un preflight CORS (OPTIONS)
pub fn preflight_response() -> Response {
    Response::new(StatusCode::NoContent)
        .with_header("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS")
        .with_header(
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization, X-Requested-With",
        )
        .with_header("Access-Control-Max-Age", "86400")
        .with_cors()
}
