//! # Codec de Frames HTTP/2
//! src/http2/frame.rs
//!
//! Framing binario del RFC 7540. Cada frame lleva un header de 9 bytes:
//! largo de 24 bits, tipo, flags y stream id de 31 bits (el bit alto es
//! reservado y se ignora al leer).
//!
//! Este módulo solo conoce bytes; la compresión HPACK de los bloques de
//! headers se delega en `loona-hpack` desde la sesión.

/// Preface de conexión: lo primero que manda un cliente HTTP/2
pub const CONNECTION_PREFACE: &[u8; 24] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// Tamaño del header de frame (9 bytes)
pub const FRAME_HEADER_SIZE: usize = 9;

// Tipos de frame
pub const FRAME_DATA: u8 = 0x0;
pub const FRAME_HEADERS: u8 = 0x1;
pub const FRAME_PRIORITY: u8 = 0x2;
pub const FRAME_RST_STREAM: u8 = 0x3;
pub const FRAME_SETTINGS: u8 = 0x4;
pub const FRAME_PUSH_PROMISE: u8 = 0x5;
pub const FRAME_PING: u8 = 0x6;
pub const FRAME_GOAWAY: u8 = 0x7;
pub const FRAME_WINDOW_UPDATE: u8 = 0x8;
pub const FRAME_CONTINUATION: u8 = 0x9;

// Flags
pub const FLAG_END_STREAM: u8 = 0x1;
pub const FLAG_ACK: u8 = 0x1;
pub const FLAG_END_HEADERS: u8 = 0x4;
pub const FLAG_PADDED: u8 = 0x8;
pub const FLAG_PRIORITY: u8 = 0x20;

// Identificadores de SETTINGS
pub const SETTINGS_HEADER_TABLE_SIZE: u16 = 0x1;
pub const SETTINGS_ENABLE_PUSH: u16 = 0x2;
pub const SETTINGS_MAX_CONCURRENT_STREAMS: u16 = 0x3;
pub const SETTINGS_INITIAL_WINDOW_SIZE: u16 = 0x4;
pub const SETTINGS_MAX_FRAME_SIZE: u16 = 0x5;
pub const SETTINGS_MAX_HEADER_LIST_SIZE: u16 = 0x6;

// Códigos de error (RFC 7540 sección 7)
pub const ERROR_NO_ERROR: u32 = 0x0;
pub const ERROR_PROTOCOL: u32 = 0x1;
pub const ERROR_FLOW_CONTROL: u32 = 0x3;
pub const ERROR_FRAME_SIZE: u32 = 0x6;
pub const ERROR_REFUSED_STREAM: u32 = 0x7;
pub const ERROR_COMPRESSION: u32 = 0x9;

/// Header de frame parseado
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub length: u32,
    pub frame_type: u8,
    pub flags: u8,
    pub stream_id: u32,
}

impl FrameHeader {
    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }
}

/// Frame completo: header más payload crudo
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub header: FrameHeader,
    pub payload: Vec<u8>,
}

/// Parsea el header de 9 bytes del inicio del buffer
pub fn parse_frame_header(buffer: &[u8]) -> Option<FrameHeader> {
    if buffer.len() < FRAME_HEADER_SIZE {
        return None;
    }

    Some(FrameHeader {
        length: u32::from_be_bytes([0, buffer[0], buffer[1], buffer[2]]),
        frame_type: buffer[3],
        flags: buffer[4],
        // El bit alto del stream id es reservado
        stream_id: u32::from_be_bytes([buffer[5] & 0x7F, buffer[6], buffer[7], buffer[8]]),
    })
}

/// Codifica un header de frame
pub fn encode_frame_header(length: u32, frame_type: u8, flags: u8, stream_id: u32) -> [u8; 9] {
    let len = length.to_be_bytes();
    let sid = (stream_id & 0x7FFF_FFFF).to_be_bytes();
    [
        len[1], len[2], len[3], frame_type, flags, sid[0], sid[1], sid[2], sid[3],
    ]
}

/// Extrae el siguiente frame completo del buffer, consumiéndolo
///
/// Retorna `None` si el buffer no contiene todavía un frame entero.
pub fn next_frame(buffer: &mut Vec<u8>) -> Option<RawFrame> {
    let header = parse_frame_header(buffer)?;
    let total = FRAME_HEADER_SIZE + header.length as usize;
    if buffer.len() < total {
        return None;
    }

    let payload = buffer[FRAME_HEADER_SIZE..total].to_vec();
    buffer.drain(..total);
    Some(RawFrame { header, payload })
}

fn build(frame_type: u8, flags: u8, stream_id: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    out.extend_from_slice(&encode_frame_header(
        payload.len() as u32,
        frame_type,
        flags,
        stream_id,
    ));
    out.extend_from_slice(payload);
    out
}

/// SETTINGS inicial con las entradas dadas (id, valor)
pub fn settings_frame(entries: &[(u16, u32)]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(entries.len() * 6);
    for (id, value) in entries {
        payload.extend_from_slice(&id.to_be_bytes());
        payload.extend_from_slice(&value.to_be_bytes());
    }
    build(FRAME_SETTINGS, 0, 0, &payload)
}

/// SETTINGS con flag ACK (payload vacío)
pub fn settings_ack() -> Vec<u8> {
    build(FRAME_SETTINGS, FLAG_ACK, 0, &[])
}

/// Frame DATA, opcionalmente con END_STREAM
pub fn data_frame(stream_id: u32, chunk: &[u8], end_stream: bool) -> Vec<u8> {
    let flags = if end_stream { FLAG_END_STREAM } else { 0 };
    build(FRAME_DATA, flags, stream_id, chunk)
}

/// Frame HEADERS con un bloque HPACK completo (END_HEADERS siempre)
pub fn headers_frame(stream_id: u32, block: &[u8], end_stream: bool) -> Vec<u8> {
    let mut flags = FLAG_END_HEADERS;
    if end_stream {
        flags |= FLAG_END_STREAM;
    }
    build(FRAME_HEADERS, flags, stream_id, block)
}

/// Frame PUSH_PROMISE sobre el stream padre
pub fn push_promise_frame(parent_stream: u32, promised_stream: u32, block: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(4 + block.len());
    payload.extend_from_slice(&(promised_stream & 0x7FFF_FFFF).to_be_bytes());
    payload.extend_from_slice(block);
    build(FRAME_PUSH_PROMISE, FLAG_END_HEADERS, parent_stream, &payload)
}

/// Frame WINDOW_UPDATE para un stream o la conexión (stream 0)
pub fn window_update_frame(stream_id: u32, increment: u32) -> Vec<u8> {
    build(
        FRAME_WINDOW_UPDATE,
        0,
        stream_id,
        &(increment & 0x7FFF_FFFF).to_be_bytes(),
    )
}

/// Frame RST_STREAM con código de error
pub fn rst_stream_frame(stream_id: u32, error_code: u32) -> Vec<u8> {
    build(FRAME_RST_STREAM, 0, stream_id, &error_code.to_be_bytes())
}

/// Frame GOAWAY con el último stream procesado y código de error
pub fn goaway_frame(last_stream_id: u32, error_code: u32) -> Vec<u8> {
    let mut payload = Vec::with_capacity(8);
    payload.extend_from_slice(&(last_stream_id & 0x7FFF_FFFF).to_be_bytes());
    payload.extend_from_slice(&error_code.to_be_bytes());
    build(FRAME_GOAWAY, 0, 0, &payload)
}

/// PING de respuesta (ACK) con el payload de 8 bytes espejado
pub fn ping_ack(payload: &[u8]) -> Vec<u8> {
    build(FRAME_PING, FLAG_ACK, 0, payload)
}
