//! # Construcción de Respuestas HTTP
//!
//! Este módulo proporciona una API para construir respuestas HTTP/1.1
//! de forma programática y convertirlas a bytes para enviar al cliente.
//!
//! Los headers `Date`, `Server`, `Content-Length` y los de keep-alive se
//! agregan al serializar, no al construir: `Content-Length` siempre es
//! igual al largo del body.
//!
//! ## Ejemplo de uso
//!
//! ```
//! use redunix_server::http::{Response, StatusCode};
//!
//! let response = Response::new(StatusCode::Ok)
//!     .with_header("Content-Type", "application/json")
//!     .with_body(r#"{"message": "Hello"}"#);
//!
//! let bytes = response.to_bytes();
//! // Ahora puedes enviar `bytes` por el socket
//! ```

use super::StatusCode;
use std::collections::HashMap;

/// Nombre del servidor anunciado en el header `Server`
pub const SERVER_NAME: &str = "RedUnix-MultiProto/1.0";

/// Representa una respuesta HTTP completa
#[derive(Debug, Clone)]
pub struct Response {
    /// Código de estado HTTP (200, 404, etc.)
    status: StatusCode,

    /// Headers HTTP (HashMap para evitar duplicados)
    headers: HashMap<String, String>,

    /// Cuerpo de la respuesta (puede ser vacío)
    body: Vec<u8>,

    /// Keep-alive negociado: Some(timeout en segundos) o None para cerrar
    keep_alive: Option<u64>,

    /// Respuesta a un HEAD: se serializa sin body pero con Content-Length
    head_only: bool,
}

impl Response {
    /// Crea una nueva respuesta con el código de estado especificado
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
            keep_alive: None,
            head_only: false,
        }
    }

    /// Agrega un header a la respuesta (builder)
    ///
    /// Si el header ya existe, se sobreescribe.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    /// Agrega un header a una respuesta existente (versión mutable)
    pub fn add_header(&mut self, name: &str, value: &str) {
        self.headers.insert(name.to_string(), value.to_string());
    }

    /// Establece el cuerpo de la respuesta desde un string
    pub fn with_body(mut self, body: &str) -> Self {
        self.body = body.as_bytes().to_vec();
        self
    }

    /// Establece el cuerpo de la respuesta desde bytes
    ///
    /// Útil para respuestas binarias (imágenes, archivos, etc.)
    pub fn with_body_bytes(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Marca la respuesta para mantener la conexión abierta
    ///
    /// La serialización agrega `Connection: keep-alive` y
    /// `Keep-Alive: timeout=N`. Sin esta marca se emite
    /// `Connection: close`.
    pub fn set_keep_alive(&mut self, timeout_secs: u64) {
        self.keep_alive = Some(timeout_secs);
    }

    /// Indica si la conexión debe mantenerse abierta tras enviar
    pub fn keeps_alive(&self) -> bool {
        self.keep_alive.is_some()
    }

    /// Convierte la respuesta en su variante para HEAD
    ///
    /// El body se conserva solo para calcular Content-Length; no se envía.
    pub fn into_head(mut self) -> Self {
        self.head_only = true;
        self
    }

    /// Agrega los headers CORS que llevan todas las respuestas del API
    pub fn with_cors(self) -> Self {
        self.with_header("Access-Control-Allow-Origin", "*")
            .with_header("Access-Control-Allow-Credentials", "true")
    }

    /// Crea una respuesta JSON exitosa (200 OK)
    pub fn json(body: &str) -> Self {
        Self::new(StatusCode::Ok)
            .with_header("Content-Type", "application/json")
            .with_body(body)
    }

    /// Crea una página de error HTML
    ///
    /// Formato heredado del servidor original: título con el código y
    /// un mensaje corto.
    pub fn error_page(status: StatusCode, message: &str) -> Self {
        let body = format!(
            "<!DOCTYPE html>\n\
             <html><head><title>{code} {phrase}</title></head>\n\
             <body style='font-family: Arial, sans-serif; text-align: center; margin-top: 50px;'>\n\
             <h1>{code} {phrase}</h1>\n\
             <p>{message}</p>\n\
             <hr><small>{server}</small>\n\
             </body></html>",
            code = status.as_u16(),
            phrase = status.reason_phrase(),
            message = message,
            server = SERVER_NAME,
        );

        Self::new(status)
            .with_header("Content-Type", "text/html")
            .with_body(&body)
    }

    /// Convierte la respuesta a bytes listos para enviar por el socket
    ///
    /// Genera el formato completo:
    /// - Status line: `HTTP/1.1 200 OK\r\n`
    /// - Headers fijos: `Server`, `Date`, `Content-Length`, `Connection`
    /// - Headers propios de la respuesta
    /// - Línea vacía y body
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(256 + self.body.len());

        // 1. Status line
        let status_line = format!("HTTP/1.1 {}\r\n", self.status);
        result.extend_from_slice(status_line.as_bytes());

        // 2. Headers fijos del servidor
        result.extend_from_slice(format!("Server: {}\r\n", SERVER_NAME).as_bytes());
        result.extend_from_slice(format!("Date: {}\r\n", http_date_now()).as_bytes());
        result.extend_from_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());

        match self.keep_alive {
            Some(timeout) => {
                result.extend_from_slice(b"Connection: keep-alive\r\n");
                result.extend_from_slice(format!("Keep-Alive: timeout={}\r\n", timeout).as_bytes());
            }
            None => result.extend_from_slice(b"Connection: close\r\n"),
        }

        // 3. Headers propios
        for (name, value) in &self.headers {
            result.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
        }

        // 4. Línea vacía y body (omitido para HEAD)
        result.extend_from_slice(b"\r\n");
        if !self.head_only {
            result.extend_from_slice(&self.body);
        }

        result
    }

    /// Obtiene el código de estado de la respuesta
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Obtiene una referencia a los headers
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Obtiene una referencia al body
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Fecha actual en formato RFC 1123 para el header `Date`
///
/// Ejemplo: `Sun, 02 Aug 2026 10:15:00 GMT`
fn http_date_now() -> String {
    chrono::Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_response() {
        let response = Response::new(StatusCode::Ok);
        assert_eq!(response.status(), StatusCode::Ok);
        assert!(response.headers().is_empty());
        assert!(response.body().is_empty());
        assert!(!response.keeps_alive());
    }

    #[test]
    fn test_with_header() {
        let response = Response::new(StatusCode::Ok)
            .with_header("Content-Type", "text/plain")
            .with_header("X-Custom", "value");

        assert_eq!(response.headers().get("Content-Type"), Some(&"text/plain".to_string()));
        assert_eq!(response.headers().get("X-Custom"), Some(&"value".to_string()));
    }

    #[test]
    fn test_to_bytes_basic() {
        let response = Response::new(StatusCode::Ok)
            .with_header("Content-Type", "text/plain")
            .with_body("Test");

        let bytes = response.to_bytes();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Type: text/plain\r\n"));
        assert!(text.contains("Content-Length: 4\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        assert!(text.contains("Server: RedUnix-MultiProto/1.0\r\n"));
        assert!(text.contains("Date: "));
        assert!(text.ends_with("\r\n\r\nTest"));
    }

    #[test]
    fn test_keep_alive_headers() {
        let mut response = Response::new(StatusCode::Ok).with_body("ok");
        response.set_keep_alive(5);

        let text = String::from_utf8(response.to_bytes()).unwrap();
        assert!(text.contains("Connection: keep-alive\r\n"));
        assert!(text.contains("Keep-Alive: timeout=5\r\n"));
        assert!(!text.contains("Connection: close"));
    }

    #[test]
    fn test_head_strips_body_keeps_length() {
        let response = Response::new(StatusCode::Ok).with_body("contenido").into_head();

        let text = String::from_utf8(response.to_bytes()).unwrap();
        assert!(text.contains("Content-Length: 9\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_cors_headers() {
        let response = Response::json("{}").with_cors();

        assert_eq!(
            response.headers().get("Access-Control-Allow-Origin"),
            Some(&"*".to_string())
        );
        assert_eq!(
            response.headers().get("Access-Control-Allow-Credentials"),
            Some(&"true".to_string())
        );
    }

    #[test]
    fn test_error_page() {
        let response = Response::error_page(StatusCode::NotFound, "The requested file was not found.");

        assert_eq!(response.status(), StatusCode::NotFound);
        let body = String::from_utf8(response.body().to_vec()).unwrap();
        assert!(body.contains("404 Not Found"));
        assert!(body.contains("The requested file was not found."));
    }

    #[test]
    fn test_content_length_matches_body() {
        let data = vec![0x00, 0x01, 0x02, 0xFF];
        let response = Response::new(StatusCode::Ok).with_body_bytes(data.clone());

        assert_eq!(response.body(), &data[..]);
        let text = String::from_utf8_lossy(&response.to_bytes()).into_owned();
        assert!(text.contains("Content-Length: 4\r\n"));
    }

    #[test]
    fn test_http_date_format() {
        let date = http_date_now();
        // "Sun, 02 Aug 2026 10:15:00 GMT"
        assert!(date.ends_with(" GMT"));
        assert_eq!(date.len(), 29);
    }
}
