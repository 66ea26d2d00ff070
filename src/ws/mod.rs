//! # Subsistema WebSocket
//! src/ws/mod.rs
//!
//! Implementa el protocolo WebSocket del RFC 6455 sobre el upgrade
//! HTTP/1.1:
//!
//! - `handshake`: derivación de la clave de aceptación y respuesta 101
//! - `frame`: parser y encoder de frames (text, close, ping, pong)
//! - `handler`: mapa de conexiones, loop de lectura por conexión y los
//!   loops de broadcast y ping
//!
//! Los clientes del dashboard mandan comandos de texto
//! (`request_metrics`, `request_rate`, `system_metrics`) y reciben los
//! snapshots JSON del collector de métricas.

pub mod frame;
pub mod handler;
pub mod handshake;

pub use frame::{Frame, FrameError, OpCode};
pub use handler::WebSocketHub;
pub use handshake::{accept_key, is_websocket_request, upgrade_response};
