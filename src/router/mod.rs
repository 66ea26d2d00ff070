//! # Sistema de Routing
//! src/router/mod.rs
//!
//! Superficies de ruteo del servidor:
//!
//! ```text
//! Request → ¿/api? → API REST (api.rs)
//!         → ¿/dashboard? → dashboard.html del docroot
//!         → archivo estático bajo el docroot (files.rs)
//! ```
//!
//! El despacho por método (GET/POST/HEAD/OPTIONS) vive en el loop
//! HTTP/1.1; este módulo resuelve cada superficie puntual.

pub mod api;
pub mod files;

pub use api::{handle_api, preflight_response, ServerStats, UserStore};
pub use files::FileHandler;

use crate::http::{Response, StatusCode};

/// Sirve un archivo estático del docroot, o 404
pub fn serve_static(files: &FileHandler, path: &str) -> Response {
    if !files.file_exists(path) {
        return Response::error_page(
            StatusCode::NotFound,
            "The requested file was not found on this server.",
        );
    }

    match files.read_file(path) {
        Ok(content) => Response::new(StatusCode::Ok)
            .with_header("Content-Type", files.mime_type(path))
            .with_body_bytes(content),
        Err(_) => Response::error_page(
            StatusCode::NotFound,
            "The requested file was not found on this server.",
        ),
    }
}

/// Sirve el dashboard de rendimiento
///
/// Usa `dashboard.html` del docroot si existe; si no, una página mínima
/// con el aviso.
pub fn serve_dashboard(files: &FileHandler) -> Response {
    if files.file_exists("/dashboard.html") {
        return serve_static(files, "/dashboard.html");
    }

    let fallback = r#"<!DOCTYPE html>
<html>
<head>
    <title>Performance Dashboard</title>
    <style>body { font-family: Arial, sans-serif; margin: 40px; }</style>
</head>
<body>
    <h1>Performance Dashboard</h1>
    <p>No se encontró dashboard.html en el document root.</p>
    <p><a href="/">Inicio</a> | <a href="/api/docs">API Docs</a></p>
</body>
</html>
"#;

    Response::new(StatusCode::Ok)
        .with_header("Content-Type", "text/html")
        .with_body(fallback)
        .with_cors()
}
