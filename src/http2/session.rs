//! # Sesión HTTP/2
//! src/http2/session.rs
//!
//! Máquina de estados de una conexión HTTP/2: tabla de streams,
//! settings del peer, ventanas de flow control y el buffer de salida.
//! La sesión es dueña exclusiva de su tabla de streams: vive en la
//! tarea del worker que atiende la conexión y nunca se comparte.
//!
//! El intercambio de headers comprimidos se delega en `loona-hpack`;
//! el framing binario vive en [`crate::http2::frame`].
//!
//! Reposición de ventanas: por cada DATA recibido se encola un
//! WINDOW_UPDATE por el largo del payload, para el stream y para la
//! conexión. Emisión: un DATA solo sale si la ventana del stream y la
//! de la conexión son positivas, partido en frames de a lo sumo
//! MAX_FRAME_SIZE del peer; entre streams listos se sirve primero al
//! de mayor peso, con empates por id ascendente.

use crate::http2::frame::{self, RawFrame};
use crate::http2::stream::{Priority, Stream};
use crate::metrics::MetricsCollector;
use crate::router::FileHandler;
use crate::shutdown::ShutdownCoordinator;
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Instant;

/// Ventana inicial por defecto del RFC (antes de cualquier SETTINGS)
const DEFAULT_WINDOW: i64 = 65535;

/// Vista de los SETTINGS de un extremo
#[derive(Debug, Clone, Copy)]
pub struct Settings {
    pub header_table_size: u32,
    pub enable_push: bool,
    pub max_concurrent_streams: u32,
    pub initial_window_size: u32,
    pub max_frame_size: u32,
    pub max_header_list_size: u32,
}

impl Settings {
    /// Valores por defecto del RFC 7540 (vista inicial del peer)
    pub fn rfc_defaults() -> Self {
        Self {
            header_table_size: 4096,
            enable_push: true,
            max_concurrent_streams: u32::MAX,
            initial_window_size: 65535,
            max_frame_size: 16384,
            max_header_list_size: u32::MAX,
        }
    }

    /// Los SETTINGS que anuncia este servidor
    pub fn local() -> Self {
        Self {
            header_table_size: 4096,
            enable_push: true,
            max_concurrent_streams: 100,
            initial_window_size: 65536,
            max_frame_size: 16384,
            max_header_list_size: 8192,
        }
    }
}

/// Violaciones de protocolo que terminan la sesión con GOAWAY
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum H2Error {
    Protocol,
    FlowControl,
    FrameSize,
    Compression,
}

impl H2Error {
    /// Código de error del GOAWAY correspondiente
    pub fn code(&self) -> u32 {
        match self {
            H2Error::Protocol => frame::ERROR_PROTOCOL,
            H2Error::FlowControl => frame::ERROR_FLOW_CONTROL,
            H2Error::FrameSize => frame::ERROR_FRAME_SIZE,
            H2Error::Compression => frame::ERROR_COMPRESSION,
        }
    }
}

impl std::fmt::Display for H2Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            H2Error::Protocol => write!(f, "protocol error"),
            H2Error::FlowControl => write!(f, "flow control error"),
            H2Error::FrameSize => write!(f, "frame size error"),
            H2Error::Compression => write!(f, "header compression error"),
        }
    }
}

impl std::error::Error for H2Error {}

/// Bloque de headers a medio llegar (esperando CONTINUATION)
struct PendingHeaders {
    stream_id: u32,
    end_stream: bool,
    priority: Option<Priority>,
    fragment: Vec<u8>,
}

/// Sesión HTTP/2 del lado servidor
pub struct Session {
    streams: HashMap<u32, Stream>,
    peer_settings: Settings,
    local_settings: Settings,

    decoder: loona_hpack::Decoder<'static>,
    encoder: loona_hpack::Encoder<'static>,

    in_buf: Vec<u8>,
    out_buf: Vec<u8>,

    conn_send_window: i64,
    conn_recv_window: i64,

    /// Próximo id par para streams de push
    next_push_id: u32,

    /// Mayor id de stream iniciado por el cliente visto hasta ahora
    last_client_stream: u32,

    /// El peer mandó GOAWAY: no se aceptan streams nuevos
    draining: bool,

    /// Upgrade h2c: el preface llega por el socket y hay que saltarlo
    awaiting_preface: bool,

    continuation: Option<PendingHeaders>,

    /// Mapa estático de recursos compañeros para server push
    push_map: HashMap<&'static str, Vec<&'static str>>,

    files: Arc<FileHandler>,
    metrics: Arc<MetricsCollector>,
}

impl Session {
    pub fn new(files: Arc<FileHandler>, metrics: Arc<MetricsCollector>) -> Self {
        let local = Settings::local();

        let mut push_map: HashMap<&'static str, Vec<&'static str>> = HashMap::new();
        push_map.insert("/", vec!["/style.css", "/app.js"]);
        push_map.insert("/index.html", vec!["/style.css", "/app.js"]);

        let mut session = Self {
            streams: HashMap::new(),
            peer_settings: Settings::rfc_defaults(),
            local_settings: local,
            decoder: loona_hpack::Decoder::new(),
            encoder: loona_hpack::Encoder::new(),
            in_buf: Vec::new(),
            out_buf: Vec::new(),
            conn_send_window: DEFAULT_WINDOW,
            conn_recv_window: DEFAULT_WINDOW,
            next_push_id: 2,
            last_client_stream: 0,
            draining: false,
            awaiting_preface: false,
            continuation: None,
            push_map,
            files,
            metrics,
        };

        // El SETTINGS inicial sale antes que cualquier otro frame
        session.out_buf.extend_from_slice(&frame::settings_frame(&[
            (
                frame::SETTINGS_MAX_CONCURRENT_STREAMS,
                local.max_concurrent_streams,
            ),
            (frame::SETTINGS_INITIAL_WINDOW_SIZE, local.initial_window_size),
            (frame::SETTINGS_MAX_FRAME_SIZE, local.max_frame_size),
            (frame::SETTINGS_ENABLE_PUSH, 1),
            (frame::SETTINGS_MAX_HEADER_LIST_SIZE, local.max_header_list_size),
        ]));

        session
    }

    /// Modo upgrade h2c: el cliente manda el preface por el socket
    /// después del 101, hay que consumirlo antes de decodificar frames
    pub fn expect_preface(&mut self) {
        self.awaiting_preface = true;
    }

    /// Alimenta bytes entrantes y procesa todos los frames completos
    pub fn feed(&mut self, data: &[u8]) -> Result<(), H2Error> {
        self.in_buf.extend_from_slice(data);

        if self.awaiting_preface {
            if self.in_buf.len() < frame::CONNECTION_PREFACE.len() {
                return Ok(());
            }
            if !self.in_buf.starts_with(frame::CONNECTION_PREFACE) {
                return Err(H2Error::Protocol);
            }
            self.in_buf.drain(..frame::CONNECTION_PREFACE.len());
            self.awaiting_preface = false;
        }

        while let Some(header) = frame::parse_frame_header(&self.in_buf) {
            if header.length > self.local_settings.max_frame_size {
                return Err(H2Error::FrameSize);
            }
            if self.in_buf.len() < frame::FRAME_HEADER_SIZE + header.length as usize {
                break;
            }

            let raw = match frame::next_frame(&mut self.in_buf) {
                Some(raw) => raw,
                None => break,
            };
            self.handle_frame(raw)?;
        }

        Ok(())
    }

    /// Toma el contenido acumulado del buffer de salida
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.out_buf)
    }

    /// La sesión terminó su drenaje (GOAWAY recibido y sin streams vivos)
    pub fn drained(&self) -> bool {
        self.draining && self.streams.is_empty()
    }

    /// Streams actualmente abiertos
    pub fn active_streams(&self) -> usize {
        self.streams.len()
    }

    /// Encola el GOAWAY de una violación de protocolo
    fn fail(&mut self, error: H2Error) {
        self.out_buf
            .extend_from_slice(&frame::goaway_frame(self.last_client_stream, error.code()));
    }

    // === Manejo de frames entrantes ===

    fn handle_frame(&mut self, raw: RawFrame) -> Result<(), H2Error> {
        let header = raw.header;

        // Entre un HEADERS sin END_HEADERS y su último CONTINUATION no
        // puede viajar ningún otro frame
        if let Some(pending) = &self.continuation {
            if header.frame_type != frame::FRAME_CONTINUATION
                || header.stream_id != pending.stream_id
            {
                return Err(H2Error::Protocol);
            }
        }

        match header.frame_type {
            frame::FRAME_DATA => self.on_data(raw),
            frame::FRAME_HEADERS => self.on_headers(raw),
            frame::FRAME_CONTINUATION => self.on_continuation(raw),
            frame::FRAME_PRIORITY => self.on_priority(raw),
            frame::FRAME_SETTINGS => self.on_settings(raw),
            frame::FRAME_WINDOW_UPDATE => self.on_window_update(raw),
            frame::FRAME_PING => self.on_ping(raw),
            frame::FRAME_GOAWAY => {
                self.draining = true;
                Ok(())
            }
            frame::FRAME_RST_STREAM => self.on_rst_stream(raw),
            frame::FRAME_PUSH_PROMISE => Err(H2Error::Protocol), // Un cliente no empuja
            _ => Ok(()), // Tipos desconocidos se ignoran (RFC 7540 sección 4.1)
        }
    }

    fn on_data(&mut self, raw: RawFrame) -> Result<(), H2Error> {
        let sid = raw.header.stream_id;
        if sid == 0 {
            return Err(H2Error::Protocol);
        }

        // El flow control cuenta el payload entero, padding incluido
        let flow_len = raw.header.length as i64;
        self.conn_recv_window -= flow_len;
        if self.conn_recv_window < 0 {
            return Err(H2Error::FlowControl);
        }

        let data = strip_padding(&raw)?;
        let end_stream = raw.header.has_flag(frame::FLAG_END_STREAM);

        if let Some(stream) = self.streams.get_mut(&sid) {
            stream.body.extend_from_slice(&data);
        }

        // Reposición simple: devolver exactamente lo consumido, al
        // stream y a la conexión
        if flow_len > 0 {
            self.out_buf
                .extend_from_slice(&frame::window_update_frame(sid, flow_len as u32));
            self.out_buf
                .extend_from_slice(&frame::window_update_frame(0, flow_len as u32));
            self.conn_recv_window += flow_len;
        }

        if end_stream {
            if let Some(stream) = self.streams.get_mut(&sid) {
                stream.request_complete = true;
            }
            self.process_request(sid);
        }

        Ok(())
    }

    fn on_headers(&mut self, raw: RawFrame) -> Result<(), H2Error> {
        let sid = raw.header.stream_id;
        // Los streams iniciados por el cliente son impares
        if sid == 0 || sid % 2 == 0 {
            return Err(H2Error::Protocol);
        }

        // Ids nuevos deben crecer monótonamente
        if !self.streams.contains_key(&sid) && sid <= self.last_client_stream {
            return Err(H2Error::Protocol);
        }

        let mut fragment = strip_padding(&raw)?;
        let end_stream = raw.header.has_flag(frame::FLAG_END_STREAM);

        let priority = if raw.header.has_flag(frame::FLAG_PRIORITY) {
            if fragment.len() < 5 {
                return Err(H2Error::Protocol);
            }
            let record = parse_priority(&fragment[..5], sid)?;
            fragment.drain(..5);
            Some(record)
        } else {
            None
        };

        if raw.header.has_flag(frame::FLAG_END_HEADERS) {
            self.finish_headers(sid, &fragment, end_stream, priority)
        } else {
            self.continuation = Some(PendingHeaders {
                stream_id: sid,
                end_stream,
                priority,
                fragment,
            });
            Ok(())
        }
    }

    fn on_continuation(&mut self, raw: RawFrame) -> Result<(), H2Error> {
        let mut pending = match self.continuation.take() {
            Some(pending) => pending,
            None => return Err(H2Error::Protocol),
        };

        pending.fragment.extend_from_slice(&raw.payload);

        if raw.header.has_flag(frame::FLAG_END_HEADERS) {
            let fragment = std::mem::take(&mut pending.fragment);
            self.finish_headers(
                pending.stream_id,
                &fragment,
                pending.end_stream,
                pending.priority,
            )
        } else {
            self.continuation = Some(pending);
            Ok(())
        }
    }

    /// Decodifica un bloque de headers completo y actualiza el stream
    fn finish_headers(
        &mut self,
        sid: u32,
        block: &[u8],
        end_stream: bool,
        priority: Option<Priority>,
    ) -> Result<(), H2Error> {
        // El bloque se decodifica siempre, aun si el stream se rechaza:
        // el estado HPACK es de la conexión entera
        let decoded = self
            .decoder
            .decode(block)
            .map_err(|_| H2Error::Compression)?;

        let is_new = !self.streams.contains_key(&sid);
        if is_new {
            self.last_client_stream = sid;

            // Sin streams nuevos durante el drenaje
            if self.draining {
                return Ok(());
            }

            // Tope de streams concurrentes iniciados por el cliente
            let open = self.streams.values().filter(|s| !s.local).count() as u32;
            if open >= self.local_settings.max_concurrent_streams {
                self.out_buf.extend_from_slice(&frame::rst_stream_frame(
                    sid,
                    frame::ERROR_REFUSED_STREAM,
                ));
                return Ok(());
            }
        }

        let initial_window = self.peer_settings.initial_window_size as i64;
        let stream = self
            .streams
            .entry(sid)
            .or_insert_with(|| Stream::new(sid, initial_window));

        if let Some(record) = priority {
            stream.priority = record;
        }

        for (name, value) in decoded {
            let name = String::from_utf8_lossy(&name).into_owned();
            let value = String::from_utf8_lossy(&value).into_owned();

            match name.as_str() {
                ":method" => stream.method = value,
                ":path" => stream.path = value,
                ":scheme" => stream.scheme = value,
                ":authority" => stream.authority = value,
                _ => {
                    stream.headers.insert(name, value);
                }
            }
        }
        stream.headers_complete = true;

        if end_stream {
            stream.request_complete = true;
            self.process_request(sid);
        }

        Ok(())
    }

    fn on_priority(&mut self, raw: RawFrame) -> Result<(), H2Error> {
        let sid = raw.header.stream_id;
        if sid == 0 {
            return Err(H2Error::Protocol);
        }
        if raw.payload.len() != 5 {
            return Err(H2Error::FrameSize);
        }

        let record = parse_priority(&raw.payload, sid)?;
        if let Some(stream) = self.streams.get_mut(&sid) {
            stream.priority = record;
        }
        // PRIORITY para streams desconocidos se tolera (pueden estar idle)
        Ok(())
    }

    fn on_settings(&mut self, raw: RawFrame) -> Result<(), H2Error> {
        if raw.header.stream_id != 0 {
            return Err(H2Error::Protocol);
        }

        if raw.header.has_flag(frame::FLAG_ACK) {
            if !raw.payload.is_empty() {
                return Err(H2Error::FrameSize);
            }
            return Ok(()); // ACK de nuestro SETTINGS
        }

        if raw.payload.len() % 6 != 0 {
            return Err(H2Error::FrameSize);
        }

        let mut pos = 0;
        while pos + 6 <= raw.payload.len() {
            let id = u16::from_be_bytes([raw.payload[pos], raw.payload[pos + 1]]);
            let value = u32::from_be_bytes([
                raw.payload[pos + 2],
                raw.payload[pos + 3],
                raw.payload[pos + 4],
                raw.payload[pos + 5],
            ]);

            match id {
                frame::SETTINGS_HEADER_TABLE_SIZE => {
                    self.peer_settings.header_table_size = value;
                }
                frame::SETTINGS_ENABLE_PUSH => {
                    if value > 1 {
                        return Err(H2Error::Protocol);
                    }
                    self.peer_settings.enable_push = value == 1;
                }
                frame::SETTINGS_MAX_CONCURRENT_STREAMS => {
                    self.peer_settings.max_concurrent_streams = value;
                }
                frame::SETTINGS_INITIAL_WINDOW_SIZE => {
                    if value > 0x7FFF_FFFF {
                        return Err(H2Error::FlowControl);
                    }
                    // El delta se aplica a las ventanas de todos los
                    // streams existentes (RFC 7540 sección 6.9.2)
                    let delta = value as i64 - self.peer_settings.initial_window_size as i64;
                    for stream in self.streams.values_mut() {
                        stream.send_window += delta;
                    }
                    self.peer_settings.initial_window_size = value;
                }
                frame::SETTINGS_MAX_FRAME_SIZE => {
                    if !(16384..=16_777_215).contains(&value) {
                        return Err(H2Error::Protocol);
                    }
                    self.peer_settings.max_frame_size = value;
                }
                frame::SETTINGS_MAX_HEADER_LIST_SIZE => {
                    self.peer_settings.max_header_list_size = value;
                }
                _ => {} // Settings desconocidos se ignoran
            }

            pos += 6;
        }

        self.out_buf.extend_from_slice(&frame::settings_ack());
        self.try_flush_streams();
        Ok(())
    }

    fn on_window_update(&mut self, raw: RawFrame) -> Result<(), H2Error> {
        if raw.payload.len() != 4 {
            return Err(H2Error::FrameSize);
        }

        let increment = u32::from_be_bytes([
            raw.payload[0],
            raw.payload[1],
            raw.payload[2],
            raw.payload[3],
        ]) & 0x7FFF_FFFF;

        if increment == 0 {
            return Err(H2Error::Protocol);
        }

        let sid = raw.header.stream_id;
        if sid == 0 {
            self.conn_send_window += increment as i64;
            if self.conn_send_window > 0x7FFF_FFFF {
                return Err(H2Error::FlowControl);
            }
        } else if let Some(stream) = self.streams.get_mut(&sid) {
            stream.send_window += increment as i64;
            if stream.send_window > 0x7FFF_FFFF {
                return Err(H2Error::FlowControl);
            }
        }
        // WINDOW_UPDATE para streams ya cerrados se ignora

        self.try_flush_streams();
        Ok(())
    }

    fn on_ping(&mut self, raw: RawFrame) -> Result<(), H2Error> {
        if raw.header.stream_id != 0 {
            return Err(H2Error::Protocol);
        }
        if raw.payload.len() != 8 {
            return Err(H2Error::FrameSize);
        }

        if !raw.header.has_flag(frame::FLAG_ACK) {
            self.out_buf.extend_from_slice(&frame::ping_ack(&raw.payload));
        }
        Ok(())
    }

    fn on_rst_stream(&mut self, raw: RawFrame) -> Result<(), H2Error> {
        if raw.header.stream_id == 0 {
            return Err(H2Error::Protocol);
        }
        if raw.payload.len() != 4 {
            return Err(H2Error::FrameSize);
        }

        self.streams.remove(&raw.header.stream_id);
        Ok(())
    }

    // === Generación de respuestas ===

    /// Atiende un stream cuyo request quedó completo
    fn process_request(&mut self, sid: u32) {
        let started = Instant::now();

        let (method, path, body, scheme, authority) = match self.streams.get(&sid) {
            Some(stream) if stream.request_complete => (
                stream.method.clone(),
                stream.path.clone(),
                stream.body.clone(),
                stream.scheme.clone(),
                stream.authority.clone(),
            ),
            _ => return,
        };

        let (status, content_type, response_body) = self.build_response(&method, &path, &body);

        if let Some(stream) = self.streams.get_mut(&sid) {
            stream.response_status = status;
            stream.response_headers = vec![("content-type".to_string(), content_type.clone())];
            stream.response_body = response_body;
        }

        // Los PUSH_PROMISE salen antes que los HEADERS de la respuesta
        // que referencia los recursos empujados
        let pushed = self.maybe_push(sid, &path, status, &content_type, &scheme, &authority);

        self.submit_response(sid);
        for pushed_id in pushed {
            self.submit_response(pushed_id);
        }

        self.try_flush_streams();

        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.metrics.record_request(&method, &path, status, duration_ms);
        println!("[*] HTTP/2 {} {} - {} ({:.2}ms)", method, path, status, duration_ms);
    }

    /// Calcula status, content-type y body para un request
    fn build_response(&self, method: &str, path: &str, body: &[u8]) -> (u16, String, Vec<u8>) {
        match method {
            "GET" => {
                if self.files.file_exists(path) {
                    match self.files.read_file(path) {
                        Ok(content) => {
                            (200, self.files.mime_type(path).to_string(), content)
                        }
                        Err(_) => (
                            404,
                            "text/html".to_string(),
                            b"<!DOCTYPE html><html><body><h1>404 Not Found</h1></body></html>"
                                .to_vec(),
                        ),
                    }
                } else {
                    (
                        404,
                        "text/html".to_string(),
                        b"<!DOCTYPE html><html><body><h1>404 Not Found</h1></body></html>"
                            .to_vec(),
                    )
                }
            }
            "POST" => {
                let mut echo = b"POST request received. Body: ".to_vec();
                echo.extend_from_slice(body);
                (200, "text/plain".to_string(), echo)
            }
            _ => (
                405,
                "text/plain".to_string(),
                b"Method Not Allowed".to_vec(),
            ),
        }
    }

    /// Emite promesas de push para las respuestas HTML
    ///
    /// Solo si ambos extremos tienen push habilitado. Un recurso
    /// compañero que no existe bajo el docroot suprime su promesa.
    fn maybe_push(
        &mut self,
        parent_id: u32,
        path: &str,
        status: u16,
        content_type: &str,
        scheme: &str,
        authority: &str,
    ) -> Vec<u32> {
        // Solo las respuestas HTML exitosas empujan recursos
        if status != 200 || !content_type.starts_with("text/html") || !self.peer_settings.enable_push
        {
            return Vec::new();
        }

        let companions = match self.push_map.get(path) {
            Some(companions) => companions.clone(),
            None => return Vec::new(),
        };

        let scheme = if scheme.is_empty() { "http" } else { scheme };
        let mut pushed = Vec::new();

        for companion in companions {
            if !self.files.file_exists(companion) {
                continue; // Promesa suprimida
            }

            let content = match self.files.read_file(companion) {
                Ok(content) => content,
                Err(_) => continue,
            };

            let promised_id = self.next_push_id;
            self.next_push_id += 2;

            // El request sintético de la promesa hereda authority y scheme
            let request_headers: Vec<(Vec<u8>, Vec<u8>)> = vec![
                (b":method".to_vec(), b"GET".to_vec()),
                (b":path".to_vec(), companion.as_bytes().to_vec()),
                (b":scheme".to_vec(), scheme.as_bytes().to_vec()),
                (b":authority".to_vec(), authority.as_bytes().to_vec()),
            ];
            let block = self.encoder.encode(
                request_headers
                    .iter()
                    .map(|(n, v)| (n.as_slice(), v.as_slice())),
            );
            self.out_buf
                .extend_from_slice(&frame::push_promise_frame(parent_id, promised_id, &block));

            let mut stream =
                Stream::new_pushed(promised_id, self.peer_settings.initial_window_size as i64);
            stream.method = "GET".to_string();
            stream.path = companion.to_string();
            stream.response_status = 200;
            stream.response_headers = vec![(
                "content-type".to_string(),
                self.files.mime_type(companion).to_string(),
            )];
            stream.response_body = content;

            self.streams.insert(promised_id, stream);
            pushed.push(promised_id);
        }

        pushed
    }

    /// Encola los HEADERS de la respuesta de un stream
    fn submit_response(&mut self, sid: u32) {
        let (status, extra_headers, body_len) = match self.streams.get(&sid) {
            Some(stream) => (
                stream.response_status,
                stream.response_headers.clone(),
                stream.response_body.len(),
            ),
            None => return,
        };

        let mut headers: Vec<(Vec<u8>, Vec<u8>)> = Vec::with_capacity(extra_headers.len() + 2);
        headers.push((b":status".to_vec(), status.to_string().into_bytes()));
        headers.push((
            b"content-length".to_vec(),
            body_len.to_string().into_bytes(),
        ));
        for (name, value) in extra_headers {
            headers.push((name.into_bytes(), value.into_bytes()));
        }

        let block = self
            .encoder
            .encode(headers.iter().map(|(n, v)| (n.as_slice(), v.as_slice())));

        let end_stream = body_len == 0;
        self.out_buf
            .extend_from_slice(&frame::headers_frame(sid, &block, end_stream));

        if let Some(stream) = self.streams.get_mut(&sid) {
            stream.response_submitted = true;
            if end_stream {
                stream.end_stream_sent = true;
            }
        }
    }

    /// Drena los bodies pendientes respetando ventanas y prioridad
    ///
    /// Entre streams listos gana el de mayor peso; empates por id
    /// ascendente. Un DATA nunca supera MAX_FRAME_SIZE del peer ni las
    /// ventanas de stream y conexión.
    fn try_flush_streams(&mut self) {
        let mut ready: Vec<(u32, u16)> = self
            .streams
            .iter()
            .filter(|(_, stream)| stream.wants_write())
            .map(|(id, stream)| (*id, stream.priority.weight))
            .collect();
        ready.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let max_frame = self.peer_settings.max_frame_size as usize;

        'streams: for (sid, _weight) in ready {
            loop {
                let stream = match self.streams.get_mut(&sid) {
                    Some(stream) => stream,
                    None => continue 'streams,
                };

                let pending = stream.pending_bytes();
                if pending == 0 {
                    if !stream.end_stream_sent {
                        // Cierre con DATA vacío
                        stream.end_stream_sent = true;
                        self.out_buf
                            .extend_from_slice(&frame::data_frame(sid, &[], true));
                    }
                    continue 'streams;
                }

                if self.conn_send_window <= 0 {
                    break 'streams;
                }
                if stream.send_window <= 0 {
                    continue 'streams;
                }

                let chunk = pending
                    .min(stream.send_window as usize)
                    .min(self.conn_send_window as usize)
                    .min(max_frame);

                let start = stream.bytes_sent;
                let end_stream = start + chunk == stream.response_body.len();
                let bytes =
                    frame::data_frame(sid, &stream.response_body[start..start + chunk], end_stream);

                stream.bytes_sent += chunk;
                stream.send_window -= chunk as i64;
                if end_stream {
                    stream.end_stream_sent = true;
                }

                self.conn_send_window -= chunk as i64;
                self.out_buf.extend_from_slice(&bytes);

                if end_stream {
                    continue 'streams;
                }
            }
        }

        // Streams con respuesta completa quedan cerrados
        self.streams
            .retain(|_, stream| !(stream.end_stream_sent && stream.request_complete));
    }

    // === Loop de I/O ===

    /// Atiende la conexión hasta que el peer cierre o llegue el apagado
    ///
    /// `residual` son los bytes que el detector leyó después del
    /// preface. El timeout de lectura de 1 segundo del socket actúa
    /// como paso de polling para observar el apagado.
    pub fn run(
        mut self,
        stream: &TcpStream,
        residual: &[u8],
        coordinator: &ShutdownCoordinator,
    ) {
        if let Err(error) = self.feed(residual) {
            self.fail(error);
            let _ = self.flush_to(stream);
            return;
        }
        if self.flush_to(stream).is_err() {
            return;
        }

        let mut chunk = [0u8; 8192];

        while !coordinator.is_shutdown_requested() && !self.drained() {
            match (&*stream).read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    if let Err(error) = self.feed(&chunk[..n]) {
                        println!("[!] HTTP/2: violación de protocolo ({})", error);
                        self.fail(error);
                        let _ = self.flush_to(stream);
                        return;
                    }
                    if self.flush_to(stream).is_err() {
                        return;
                    }
                }
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(_) => break,
            }
        }

        let _ = self.flush_to(stream);
    }

    /// Escribe y vacía el buffer de salida
    fn flush_to(&mut self, stream: &TcpStream) -> io::Result<()> {
        if self.out_buf.is_empty() {
            return Ok(());
        }
        let out = std::mem::take(&mut self.out_buf);
        (&*stream).write_all(&out)
    }
}

/// Quita padding de un frame DATA/HEADERS si el flag está presente
fn strip_padding(raw: &RawFrame) -> Result<Vec<u8>, H2Error> {
    if !raw.header.has_flag(frame::FLAG_PADDED) {
        return Ok(raw.payload.clone());
    }

    if raw.payload.is_empty() {
        return Err(H2Error::Protocol);
    }
    let pad_len = raw.payload[0] as usize;
    if pad_len + 1 > raw.payload.len() {
        return Err(H2Error::Protocol);
    }

    Ok(raw.payload[1..raw.payload.len() - pad_len].to_vec())
}

/// Parsea un registro de prioridad de 5 bytes
fn parse_priority(bytes: &[u8], sid: u32) -> Result<Priority, H2Error> {
    let depends_on =
        u32::from_be_bytes([bytes[0] & 0x7F, bytes[1], bytes[2], bytes[3]]);
    let exclusive = bytes[0] & 0x80 != 0;
    let weight = bytes[4] as u16 + 1; // El wire lleva peso-1

    // Un stream no puede depender de sí mismo
    if depends_on == sid {
        return Err(H2Error::Protocol);
    }

    Ok(Priority {
        depends_on,
        weight,
        exclusive,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn temp_docroot(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("redunix_h2_{}", name));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn new_session(docroot: &PathBuf) -> Session {
        let files = Arc::new(FileHandler::new(docroot));
        let metrics = Arc::new(MetricsCollector::new());
        Session::new(files, metrics)
    }

    /// Parsea todos los frames de un buffer de salida
    fn parse_frames(mut bytes: Vec<u8>) -> Vec<RawFrame> {
        let mut frames = Vec::new();
        while let Some(frame) = frame::next_frame(&mut bytes) {
            frames.push(frame);
        }
        assert!(bytes.is_empty(), "bytes sueltos tras el último frame");
        frames
    }

    /// Bloque HPACK de un request, generado con un encoder de cliente
    fn request_block(
        encoder: &mut loona_hpack::Encoder<'static>,
        method: &str,
        path: &str,
    ) -> Vec<u8> {
        let headers: Vec<(Vec<u8>, Vec<u8>)> = vec![
            (b":method".to_vec(), method.as_bytes().to_vec()),
            (b":path".to_vec(), path.as_bytes().to_vec()),
            (b":scheme".to_vec(), b"http".to_vec()),
            (b":authority".to_vec(), b"localhost".to_vec()),
        ];
        encoder.encode(headers.iter().map(|(n, v)| (n.as_slice(), v.as_slice())))
    }

    #[test]
    fn test_initial_settings_first_in_output() {
        let dir = temp_docroot("settings");
        let mut session = new_session(&dir);

        let frames = parse_frames(session.take_output());
        assert_eq!(frames[0].header.frame_type, frame::FRAME_SETTINGS);
        assert!(!frames[0].header.has_flag(frame::FLAG_ACK));
        // 5 entradas de 6 bytes
        assert_eq!(frames[0].header.length, 30);
    }

    #[test]
    fn test_client_settings_get_acked() {
        let dir = temp_docroot("ack");
        let mut session = new_session(&dir);
        session.take_output();

        session
            .feed(&frame::settings_frame(&[(
                frame::SETTINGS_MAX_CONCURRENT_STREAMS,
                50,
            )]))
            .unwrap();

        let frames = parse_frames(session.take_output());
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].header.frame_type, frame::FRAME_SETTINGS);
        assert!(frames[0].header.has_flag(frame::FLAG_ACK));
        assert_eq!(session.peer_settings.max_concurrent_streams, 50);
    }

    #[test]
    fn test_get_request_produces_headers_then_data() {
        let dir = temp_docroot("get");
        fs::write(dir.join("index.html"), "hello h2").unwrap();
        let mut session = new_session(&dir);
        session.take_output();

        let mut encoder = loona_hpack::Encoder::new();
        let block = request_block(&mut encoder, "GET", "/");
        session
            .feed(&frame::headers_frame(1, &block, true))
            .unwrap();

        let frames = parse_frames(session.take_output());
        let headers_pos = frames
            .iter()
            .position(|f| f.header.frame_type == frame::FRAME_HEADERS)
            .expect("falta HEADERS");
        let data_pos = frames
            .iter()
            .position(|f| f.header.frame_type == frame::FRAME_DATA)
            .expect("falta DATA");
        assert!(headers_pos < data_pos, "HEADERS debe preceder a DATA");

        // Decodificar la respuesta con un decoder de cliente
        let mut decoder = loona_hpack::Decoder::new();
        let decoded = decoder.decode(&frames[headers_pos].payload).unwrap();
        let status = decoded
            .iter()
            .find(|(n, _)| n == b":status")
            .map(|(_, v)| v.clone())
            .unwrap();
        assert_eq!(status, b"200");

        let data = &frames[data_pos];
        assert_eq!(data.payload, b"hello h2");
        assert!(data.header.has_flag(frame::FLAG_END_STREAM));
        assert_eq!(data.header.stream_id, 1);

        // El stream quedó cerrado
        assert_eq!(session.active_streams(), 0);
    }

    #[test]
    fn test_unknown_path_is_404() {
        let dir = temp_docroot("404");
        let mut session = new_session(&dir);
        session.take_output();

        let mut encoder = loona_hpack::Encoder::new();
        let block = request_block(&mut encoder, "GET", "/nada.html");
        session
            .feed(&frame::headers_frame(1, &block, true))
            .unwrap();

        let frames = parse_frames(session.take_output());
        let headers = frames
            .iter()
            .find(|f| f.header.frame_type == frame::FRAME_HEADERS)
            .unwrap();

        let mut decoder = loona_hpack::Decoder::new();
        let decoded = decoder.decode(&headers.payload).unwrap();
        let status = decoded
            .iter()
            .find(|(n, _)| n == b":status")
            .map(|(_, v)| v.clone())
            .unwrap();
        assert_eq!(status, b"404");
    }

    #[test]
    fn test_post_data_replenishes_both_windows() {
        let dir = temp_docroot("flow");
        let mut session = new_session(&dir);
        session.take_output();

        let mut encoder = loona_hpack::Encoder::new();
        let block = request_block(&mut encoder, "POST", "/subir");
        // HEADERS sin END_STREAM: el body viene en DATA
        session
            .feed(&frame::headers_frame(1, &block, false))
            .unwrap();

        let payload = vec![0xAAu8; 4096];
        session.feed(&frame::data_frame(1, &payload, false)).unwrap();

        let frames = parse_frames(session.take_output());
        let mut stream_credit = 0u64;
        let mut conn_credit = 0u64;
        for f in &frames {
            if f.header.frame_type == frame::FRAME_WINDOW_UPDATE {
                let increment = u32::from_be_bytes([
                    f.payload[0],
                    f.payload[1],
                    f.payload[2],
                    f.payload[3],
                ]) as u64;
                if f.header.stream_id == 1 {
                    stream_credit += increment;
                } else if f.header.stream_id == 0 {
                    conn_credit += increment;
                }
            }
        }

        assert_eq!(stream_credit, 4096);
        assert_eq!(conn_credit, 4096);
    }

    #[test]
    fn test_post_echo_response() {
        let dir = temp_docroot("post");
        let mut session = new_session(&dir);
        session.take_output();

        let mut encoder = loona_hpack::Encoder::new();
        let block = request_block(&mut encoder, "POST", "/subir");
        session
            .feed(&frame::headers_frame(1, &block, false))
            .unwrap();
        session.feed(&frame::data_frame(1, b"carga", true)).unwrap();

        let frames = parse_frames(session.take_output());
        let data = frames
            .iter()
            .find(|f| f.header.frame_type == frame::FRAME_DATA)
            .unwrap();
        assert_eq!(data.payload, b"POST request received. Body: carga");
    }

    #[test]
    fn test_large_body_split_at_max_frame_size() {
        let dir = temp_docroot("split");
        let body = vec![0x42u8; 40_000];
        fs::write(dir.join("grande.bin"), &body).unwrap();
        let mut session = new_session(&dir);
        session.take_output();

        let mut encoder = loona_hpack::Encoder::new();
        let block = request_block(&mut encoder, "GET", "/grande.bin");
        session
            .feed(&frame::headers_frame(1, &block, true))
            .unwrap();

        let frames = parse_frames(session.take_output());
        let data_frames: Vec<&RawFrame> = frames
            .iter()
            .filter(|f| f.header.frame_type == frame::FRAME_DATA)
            .collect();

        assert!(data_frames.len() >= 3);
        let total: usize = data_frames.iter().map(|f| f.payload.len()).sum();
        assert_eq!(total, 40_000);
        for f in &data_frames {
            assert!(f.payload.len() <= 16384);
        }
        // Solo el último lleva END_STREAM
        assert!(data_frames.last().unwrap().header.has_flag(frame::FLAG_END_STREAM));
        for f in &data_frames[..data_frames.len() - 1] {
            assert!(!f.header.has_flag(frame::FLAG_END_STREAM));
        }
    }

    #[test]
    fn test_stream_window_blocks_then_window_update_drains() {
        let dir = temp_docroot("blocked");
        fs::write(dir.join("f.txt"), vec![0x01u8; 100]).unwrap();
        let mut session = new_session(&dir);
        session.take_output();

        // Ventana inicial de stream minúscula
        session
            .feed(&frame::settings_frame(&[(
                frame::SETTINGS_INITIAL_WINDOW_SIZE,
                10,
            )]))
            .unwrap();
        session.take_output();

        let mut encoder = loona_hpack::Encoder::new();
        let block = request_block(&mut encoder, "GET", "/f.txt");
        session
            .feed(&frame::headers_frame(1, &block, true))
            .unwrap();

        let frames = parse_frames(session.take_output());
        let sent: usize = frames
            .iter()
            .filter(|f| f.header.frame_type == frame::FRAME_DATA)
            .map(|f| f.payload.len())
            .sum();
        assert_eq!(sent, 10, "solo la ventana concedida puede salir");

        // El crédito libera el resto
        session
            .feed(&frame::window_update_frame(1, 1000))
            .unwrap();
        let frames = parse_frames(session.take_output());
        let sent: usize = frames
            .iter()
            .filter(|f| f.header.frame_type == frame::FRAME_DATA)
            .map(|f| f.payload.len())
            .sum();
        assert_eq!(sent, 90);
    }

    #[test]
    fn test_priority_orders_blocked_streams() {
        let dir = temp_docroot("prio");
        fs::write(dir.join("a.txt"), vec![0x0Au8; 50]).unwrap();
        fs::write(dir.join("b.txt"), vec![0x0Bu8; 50]).unwrap();
        let mut session = new_session(&dir);
        session.take_output();

        // Ventana 0: las respuestas quedan encoladas sin emitir DATA
        session
            .feed(&frame::settings_frame(&[(
                frame::SETTINGS_INITIAL_WINDOW_SIZE,
                0,
            )]))
            .unwrap();

        let mut encoder = loona_hpack::Encoder::new();
        let block_a = request_block(&mut encoder, "GET", "/a.txt");
        session
            .feed(&frame::headers_frame(1, &block_a, true))
            .unwrap();
        let block_b = request_block(&mut encoder, "GET", "/b.txt");
        session
            .feed(&frame::headers_frame(3, &block_b, true))
            .unwrap();

        // El stream 3 pasa a pesar más que el 1
        let mut priority_payload = vec![0u8, 0, 0, 0];
        priority_payload.push(255); // peso 256
        let mut priority_frame = Vec::new();
        priority_frame.extend_from_slice(&frame::encode_frame_header(
            5,
            frame::FRAME_PRIORITY,
            0,
            3,
        ));
        priority_frame.extend_from_slice(&priority_payload);
        session.feed(&priority_frame).unwrap();
        session.take_output();

        // Abrir las ventanas de golpe: el delta se aplica a ambos streams
        session
            .feed(&frame::settings_frame(&[(
                frame::SETTINGS_INITIAL_WINDOW_SIZE,
                65535,
            )]))
            .unwrap();

        let frames = parse_frames(session.take_output());
        let data_streams: Vec<u32> = frames
            .iter()
            .filter(|f| f.header.frame_type == frame::FRAME_DATA)
            .map(|f| f.header.stream_id)
            .collect();

        assert_eq!(
            data_streams,
            vec![3, 1],
            "el stream de mayor peso drena primero"
        );
    }

    #[test]
    fn test_push_promise_for_html_with_existing_companion() {
        let dir = temp_docroot("push");
        fs::write(dir.join("index.html"), "<html></html>").unwrap();
        fs::write(dir.join("style.css"), "body{}").unwrap();
        // app.js no existe: su promesa se suprime
        let mut session = new_session(&dir);
        session.take_output();

        let mut encoder = loona_hpack::Encoder::new();
        let block = request_block(&mut encoder, "GET", "/");
        session
            .feed(&frame::headers_frame(1, &block, true))
            .unwrap();

        let frames = parse_frames(session.take_output());

        let promises: Vec<&RawFrame> = frames
            .iter()
            .filter(|f| f.header.frame_type == frame::FRAME_PUSH_PROMISE)
            .collect();
        assert_eq!(promises.len(), 1, "solo el compañero existente se promete");
        assert_eq!(promises[0].header.stream_id, 1);

        let promised_id = u32::from_be_bytes([
            promises[0].payload[0],
            promises[0].payload[1],
            promises[0].payload[2],
            promises[0].payload[3],
        ]) & 0x7FFF_FFFF;
        assert_eq!(promised_id, 2, "los streams de push son pares");

        // La promesa hereda :authority y :scheme del request padre
        let mut decoder = loona_hpack::Decoder::new();
        let decoded = decoder.decode(&promises[0].payload[4..]).unwrap();
        let find = |name: &[u8]| {
            decoded
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(find(b":path"), b"/style.css");
        assert_eq!(find(b":scheme"), b"http");
        assert_eq!(find(b":authority"), b"localhost");

        // El stream empujado entrega su DATA
        let pushed_data = frames
            .iter()
            .find(|f| f.header.frame_type == frame::FRAME_DATA && f.header.stream_id == 2)
            .expect("falta el DATA del push");
        assert_eq!(pushed_data.payload, b"body{}");
    }

    #[test]
    fn test_push_disabled_by_peer_settings() {
        let dir = temp_docroot("nopush");
        fs::write(dir.join("index.html"), "<html></html>").unwrap();
        fs::write(dir.join("style.css"), "body{}").unwrap();
        let mut session = new_session(&dir);
        session.take_output();

        session
            .feed(&frame::settings_frame(&[(frame::SETTINGS_ENABLE_PUSH, 0)]))
            .unwrap();

        let mut encoder = loona_hpack::Encoder::new();
        let block = request_block(&mut encoder, "GET", "/");
        session
            .feed(&frame::headers_frame(1, &block, true))
            .unwrap();

        let frames = parse_frames(session.take_output());
        assert!(!frames
            .iter()
            .any(|f| f.header.frame_type == frame::FRAME_PUSH_PROMISE));
    }

    #[test]
    fn test_even_stream_id_from_client_is_protocol_error() {
        let dir = temp_docroot("even");
        let mut session = new_session(&dir);
        session.take_output();

        let mut encoder = loona_hpack::Encoder::new();
        let block = request_block(&mut encoder, "GET", "/");
        let result = session.feed(&frame::headers_frame(2, &block, true));
        assert_eq!(result, Err(H2Error::Protocol));
    }

    #[test]
    fn test_stream_ids_must_increase() {
        let dir = temp_docroot("monotonic");
        fs::write(dir.join("index.html"), "x").unwrap();
        let mut session = new_session(&dir);
        session.take_output();

        let mut encoder = loona_hpack::Encoder::new();
        let block = request_block(&mut encoder, "GET", "/");
        session
            .feed(&frame::headers_frame(5, &block, true))
            .unwrap();

        let block = request_block(&mut encoder, "GET", "/");
        let result = session.feed(&frame::headers_frame(3, &block, true));
        assert_eq!(result, Err(H2Error::Protocol));
    }

    #[test]
    fn test_bad_hpack_block_is_compression_error() {
        let dir = temp_docroot("hpack");
        let mut session = new_session(&dir);
        session.take_output();

        // Bloque con índice fuera de tabla
        let garbage = vec![0xFFu8, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        let result = session.feed(&frame::headers_frame(1, &garbage, true));
        assert_eq!(result, Err(H2Error::Compression));
    }

    #[test]
    fn test_ping_is_echoed_with_ack() {
        let dir = temp_docroot("ping");
        let mut session = new_session(&dir);
        session.take_output();

        let payload = [9u8, 8, 7, 6, 5, 4, 3, 2];
        let mut ping = Vec::new();
        ping.extend_from_slice(&frame::encode_frame_header(8, frame::FRAME_PING, 0, 0));
        ping.extend_from_slice(&payload);
        session.feed(&ping).unwrap();

        let frames = parse_frames(session.take_output());
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].header.frame_type, frame::FRAME_PING);
        assert!(frames[0].header.has_flag(frame::FLAG_ACK));
        assert_eq!(frames[0].payload, payload);
    }

    #[test]
    fn test_goaway_marks_draining_and_rejects_new_streams() {
        let dir = temp_docroot("goaway");
        fs::write(dir.join("index.html"), "x").unwrap();
        let mut session = new_session(&dir);
        session.take_output();

        session
            .feed(&frame::goaway_frame(0, frame::ERROR_NO_ERROR))
            .unwrap();
        assert!(session.drained());

        let mut encoder = loona_hpack::Encoder::new();
        let block = request_block(&mut encoder, "GET", "/");
        session
            .feed(&frame::headers_frame(1, &block, true))
            .unwrap();

        // Ningún stream nuevo durante el drenaje
        assert_eq!(session.active_streams(), 0);
        let frames = parse_frames(session.take_output());
        assert!(!frames.iter().any(|f| f.header.frame_type == frame::FRAME_HEADERS));
    }

    #[test]
    fn test_continuation_accumulates_header_block() {
        let dir = temp_docroot("cont");
        fs::write(dir.join("index.html"), "x").unwrap();
        let mut session = new_session(&dir);
        session.take_output();

        let mut encoder = loona_hpack::Encoder::new();
        let block = request_block(&mut encoder, "GET", "/");
        let (first, rest) = block.split_at(block.len() / 2);

        // HEADERS sin END_HEADERS + CONTINUATION con END_HEADERS
        let mut headers = Vec::new();
        headers.extend_from_slice(&frame::encode_frame_header(
            first.len() as u32,
            frame::FRAME_HEADERS,
            frame::FLAG_END_STREAM,
            1,
        ));
        headers.extend_from_slice(first);
        session.feed(&headers).unwrap();

        let mut continuation = Vec::new();
        continuation.extend_from_slice(&frame::encode_frame_header(
            rest.len() as u32,
            frame::FRAME_CONTINUATION,
            frame::FLAG_END_HEADERS,
            1,
        ));
        continuation.extend_from_slice(rest);
        session.feed(&continuation).unwrap();

        let frames = parse_frames(session.take_output());
        assert!(frames.iter().any(|f| f.header.frame_type == frame::FRAME_HEADERS));
    }

    #[test]
    fn test_frame_between_headers_and_continuation_is_error() {
        let dir = temp_docroot("interleave");
        let mut session = new_session(&dir);
        session.take_output();

        let mut encoder = loona_hpack::Encoder::new();
        let block = request_block(&mut encoder, "GET", "/");

        let mut headers = Vec::new();
        headers.extend_from_slice(&frame::encode_frame_header(
            block.len() as u32,
            frame::FRAME_HEADERS,
            0, // sin END_HEADERS
            1,
        ));
        headers.extend_from_slice(&block);
        session.feed(&headers).unwrap();

        let result = session.feed(&frame::window_update_frame(0, 100));
        assert_eq!(result, Err(H2Error::Protocol));
    }

    #[test]
    fn test_h2c_upgrade_expects_preface() {
        let dir = temp_docroot("h2c");
        let mut session = new_session(&dir);
        session.take_output();
        session.expect_preface();

        // El preface llega partido, seguido de un SETTINGS
        let mut wire = Vec::new();
        wire.extend_from_slice(frame::CONNECTION_PREFACE);
        wire.extend_from_slice(&frame::settings_frame(&[]));

        session.feed(&wire[..10]).unwrap();
        session.feed(&wire[10..]).unwrap();

        let frames = parse_frames(session.take_output());
        assert!(frames
            .iter()
            .any(|f| f.header.frame_type == frame::FRAME_SETTINGS
                && f.header.has_flag(frame::FLAG_ACK)));
    }

    #[test]
    fn test_wrong_preface_in_h2c_mode() {
        let dir = temp_docroot("badpreface");
        let mut session = new_session(&dir);
        session.expect_preface();

        let result = session.feed(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n");
        assert_eq!(result, Err(H2Error::Protocol));
    }

    #[test]
    fn test_window_update_zero_increment_is_error() {
        let dir = temp_docroot("zeroinc");
        let mut session = new_session(&dir);
        session.take_output();

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&frame::encode_frame_header(
            4,
            frame::FRAME_WINDOW_UPDATE,
            0,
            0,
        ));
        bytes.extend_from_slice(&0u32.to_be_bytes());

        assert_eq!(session.feed(&bytes), Err(H2Error::Protocol));
    }

    #[test]
    fn test_oversized_frame_is_frame_size_error() {
        let dir = temp_docroot("oversize");
        let mut session = new_session(&dir);
        session.take_output();

        // Header que declara más que MAX_FRAME_SIZE local
        let bytes = frame::encode_frame_header(16385, frame::FRAME_DATA, 0, 1);
        assert_eq!(session.feed(&bytes), Err(H2Error::FrameSize));
    }
}
