//! # Módulo HTTP
//!
//! Este módulo implementa el protocolo HTTP/1.x desde cero, sin usar
//! librerías de alto nivel. Incluye:
//!
//! - Parsing de requests HTTP/1.0 y HTTP/1.1
//! - Construcción de responses HTTP
//! - Manejo de status codes
//! - Extracción de query parameters con percent-decoding
//!
//! ### Formato de Request
//!
//! ```text
//! GET /path?query=value HTTP/1.1\r\n
//! Header-Name: Header-Value\r\n
//! Another-Header: Value\r\n
//! \r\n
//! ```
//!
//! ### Formato de Response
//!
//! ```text
//! HTTP/1.1 200 OK\r\n
//! Content-Type: application/json\r\n
//! Content-Length: 13\r\n
//! \r\n
//! {"ok": true}
//! ```
//!
//! Los requests con `Connection: keep-alive` bajo HTTP/1.1 mantienen el
//! socket abierto; el body de los requests se delimita únicamente por
//! `Content-Length` (chunked no soportado).

pub mod request;   // Parsing de HTTP requests
pub mod response;  // Construcción de HTTP responses
pub mod status;    // Códigos de estado HTTP

// Re-exportamos los tipos principales para facilitar su uso
pub use request::{ParseError, Request};
pub use response::Response;
pub use status::StatusCode;
