//! # Handshake WebSocket
//! src/ws/handshake.rs
//!
//! Implementa el upgrade HTTP → WebSocket del RFC 6455. La clave de
//! aceptación se deriva como:
//!
//! ```text
//! accept = base64(sha1(Sec-WebSocket-Key || GUID))
//! ```

use crate::http::Request;
use base64::Engine;
use sha1::{Digest, Sha1};

/// GUID fijo del RFC 6455 para derivar la clave de aceptación
const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Verifica si un request es un pedido de upgrade a WebSocket
///
/// Requiere `Upgrade: websocket`, `Connection` conteniendo `Upgrade` y
/// un `Sec-WebSocket-Key` presente.
pub fn is_websocket_request(request: &Request) -> bool {
    let upgrade = request
        .header("upgrade")
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);

    let connection = request
        .header("connection")
        .map(|v| v.to_ascii_lowercase().contains("upgrade"))
        .unwrap_or(false);

    upgrade && connection && request.header("sec-websocket-key").is_some()
}

/// Deriva la clave `Sec-WebSocket-Accept` a partir de la del cliente
pub fn accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    let digest = hasher.finalize();

    base64::engine::general_purpose::STANDARD.encode(digest)
}

/// Construye la respuesta 101 del handshake
///
/// Retorna `None` si falta el `Sec-WebSocket-Key`.
pub fn upgrade_response(request: &Request) -> Option<Vec<u8>> {
    let client_key = request.header("sec-websocket-key")?;
    let accept = accept_key(client_key);

    let response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n\
         \r\n",
        accept
    );

    Some(response.into_bytes())
}
