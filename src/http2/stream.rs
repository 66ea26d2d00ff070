//! # Estado de Stream HTTP/2
//! src/http2/stream.rs
//!
//! Cada stream lleva un intercambio request/response dentro de la
//! sesión. Los streams iniciados por el cliente tienen id impar y
//! creciente; los que inicia el servidor (push) tienen id par asignado
//! por la sesión.

use std::collections::HashMap;

/// Peso por defecto de la prioridad (RFC 7540 sección 5.3.5)
pub const DEFAULT_WEIGHT: u16 = 16;

/// Registro de prioridad de un stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Priority {
    /// Stream del que depende (0 = raíz)
    pub depends_on: u32,

    /// Peso 1..=256
    pub weight: u16,

    /// Dependencia exclusiva
    pub exclusive: bool,
}

impl Default for Priority {
    fn default() -> Self {
        Self {
            depends_on: 0,
            weight: DEFAULT_WEIGHT,
            exclusive: false,
        }
    }
}

/// Estado de un stream dentro de la sesión
#[derive(Debug)]
pub struct Stream {
    pub id: u32,

    // Lado request
    pub method: String,
    pub path: String,
    pub scheme: String,
    pub authority: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub headers_complete: bool,
    pub request_complete: bool,

    // Lado response
    pub response_status: u16,
    pub response_headers: Vec<(String, String)>,
    pub response_body: Vec<u8>,

    /// Cursor de bytes ya emitidos del response_body
    pub bytes_sent: usize,

    /// Los HEADERS de la respuesta ya se encolaron
    pub response_submitted: bool,

    /// Se emitió el DATA final con END_STREAM
    pub end_stream_sent: bool,

    /// Ventana de envío del stream (créditos del peer)
    pub send_window: i64,

    pub priority: Priority,

    /// Recursos auxiliares a empujar desde este stream
    pub push_resources: Vec<String>,

    /// Stream iniciado por el servidor (push)
    pub local: bool,
}

impl Stream {
    pub fn new(id: u32, initial_send_window: i64) -> Self {
        Self {
            id,
            method: String::new(),
            path: String::new(),
            scheme: String::new(),
            authority: String::new(),
            headers: HashMap::new(),
            body: Vec::new(),
            headers_complete: false,
            request_complete: false,
            response_status: 200,
            response_headers: Vec::new(),
            response_body: Vec::new(),
            bytes_sent: 0,
            response_submitted: false,
            end_stream_sent: false,
            send_window: initial_send_window,
            priority: Priority::default(),
            push_resources: Vec::new(),
            local: false,
        }
    }

    /// Crea un stream iniciado por el servidor para un push
    pub fn new_pushed(id: u32, initial_send_window: i64) -> Self {
        let mut stream = Self::new(id, initial_send_window);
        stream.local = true;
        stream.headers_complete = true;
        stream.request_complete = true;
        stream
    }

    /// Bytes de respuesta aún no emitidos
    pub fn pending_bytes(&self) -> usize {
        self.response_body.len().saturating_sub(self.bytes_sent)
    }

    /// El stream tiene respuesta encolada con datos (o cierre) pendiente
    pub fn wants_write(&self) -> bool {
        self.response_submitted && !self.end_stream_sent
    }
}
