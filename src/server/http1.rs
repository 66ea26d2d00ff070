//! # Loop de Conexión HTTP/1.1
//! src/server/http1.rs
//!
//! Atiende una conexión HTTP/1.1 completa: lee headers (tope de 8 KiB,
//! plazo de 5 segundos), completa el body por Content-Length, despacha
//! por método y negocia keep-alive.
//!
//! Antes del despacho normal se chequean los upgrades:
//!
//! - `Upgrade: websocket` + `Sec-WebSocket-Key` sobre el path WebSocket
//!   hace el handshake y entrega el socket al hub.
//! - `Upgrade: h2c` en un GET responde `101 Switching Protocols` y
//!   transfiere el socket a la sesión HTTP/2.

use crate::http::{Request, Response, StatusCode};
use crate::http2::Session;
use crate::router::{self, ServerStats};
use crate::server::acceptor::ServerContext;
use crate::ws;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Tope de la sección de headers
const MAX_HEADER_BYTES: usize = 8192;

/// Plazo para recibir los headers completos
const HEADER_DEADLINE: Duration = Duration::from_secs(5);

/// Resultado de la lectura de un request
enum ReadOutcome {
    /// Headers completos (el buffer puede traer el inicio del body)
    Complete(Vec<u8>),

    /// El peer cerró, venció el plazo o superó el tope
    Closed,
}

/// Atiende la conexión hasta que se cierre o se decline keep-alive
///
/// `initial` trae los bytes que el detector de protocolo ya leyó.
pub fn handle_connection(
    ctx: &Arc<ServerContext>,
    stream: Arc<TcpStream>,
    conn_id: u64,
    initial: Vec<u8>,
) {
    let mut carry = initial;

    loop {
        if ctx.coordinator.is_shutdown_requested() {
            break;
        }

        let started = Instant::now();

        let raw = match read_request(ctx, &stream, std::mem::take(&mut carry)) {
            ReadOutcome::Complete(raw) => raw,
            ReadOutcome::Closed => break,
        };

        let mut request = match Request::parse(&raw) {
            Ok(request) => request,
            Err(error) => {
                // Request malformado: 400 y cierre
                let response = Response::error_page(
                    StatusCode::BadRequest,
                    "The request could not be understood by the server.",
                );
                send_response(&stream, &response);
                record(ctx, "INVALID", "INVALID", 400, started);
                if !ctx.coordinator.is_shutdown_requested() {
                    println!("[!] Parse error: {}", error);
                }
                break;
            }
        };

        // Completar el body declarado por Content-Length
        if !read_remaining_body(&stream, &mut request, ctx) {
            break;
        }

        // Upgrade a WebSocket
        if ctx.config.is_websocket_path(request.path()) && ws::is_websocket_request(&request) {
            if let Some(handshake) = ws::upgrade_response(&request) {
                if send_all(&stream, &handshake) {
                    record(ctx, request.method(), request.path(), 101, started);
                    // El hub pasa a ser el dueño lógico del socket
                    ctx.connections.remove(conn_id);
                    let client_id = ctx.ws.generate_client_id();
                    ctx.ws.run_connection(stream, client_id);
                    return;
                }
            }
            break;
        }

        // Upgrade a h2c
        if wants_h2c_upgrade(ctx, &request) {
            let switch = "HTTP/1.1 101 Switching Protocols\r\n\
                          Connection: Upgrade\r\n\
                          Upgrade: h2c\r\n\
                          \r\n";
            if send_all(&stream, switch.as_bytes()) {
                record(ctx, request.method(), request.path(), 101, started);
                ctx.connections.remove(conn_id);
                let mut session = Session::new(Arc::clone(&ctx.files), Arc::clone(&ctx.metrics));
                session.expect_preface();
                session.run(&stream, &[], &ctx.coordinator);
            }
            return;
        }

        if ctx.coordinator.is_shutdown_requested() {
            break;
        }

        // Despacho normal por método
        let keep_alive = should_keep_alive(ctx, &request);
        let mut response = route_request(ctx, &request);

        // 400/405/500 fuerzan el cierre; 404 puede mantener la conexión
        let force_close = matches!(
            response.status(),
            StatusCode::BadRequest | StatusCode::MethodNotAllowed | StatusCode::InternalServerError
        );

        let keep_alive = keep_alive && !force_close;
        if keep_alive {
            response.set_keep_alive(ctx.config.timeout_secs);
        }

        let sent = send_response(&stream, &response);
        record(
            ctx,
            request.method(),
            request.path(),
            response.status().as_u16(),
            started,
        );

        if !sent || !keep_alive || ctx.coordinator.is_shutdown_requested() {
            break;
        }

        // Conexión persistente: refrescar actividad y esperar otro request
        ctx.connections.touch(conn_id);
    }
}

/// Lee del socket hasta tener los headers completos (`\r\n\r\n`)
fn read_request(ctx: &ServerContext, stream: &TcpStream, initial: Vec<u8>) -> ReadOutcome {
    let mut buffer = initial;
    let deadline = Instant::now() + HEADER_DEADLINE;
    let mut chunk = [0u8; 4096];

    loop {
        if crate::http::request::find_header_end(&buffer).is_some() {
            return ReadOutcome::Complete(buffer);
        }

        if buffer.len() > MAX_HEADER_BYTES {
            return ReadOutcome::Closed; // Headers abusivos
        }

        if ctx.coordinator.is_shutdown_requested() || Instant::now() > deadline {
            return ReadOutcome::Closed;
        }

        match (&*stream).read(&mut chunk) {
            Ok(0) => return ReadOutcome::Closed,
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut =>
            {
                // Paso de polling de 1 segundo del socket
                continue;
            }
            Err(_) => return ReadOutcome::Closed,
        }
    }
}

/// Completa el body hasta el Content-Length declarado
fn read_remaining_body(stream: &TcpStream, request: &mut Request, ctx: &ServerContext) -> bool {
    let declared = request.content_length();
    let deadline = Instant::now() + HEADER_DEADLINE;
    let mut chunk = [0u8; 4096];

    while request.body().len() < declared {
        if ctx.coordinator.is_shutdown_requested() || Instant::now() > deadline {
            return false;
        }

        let remaining = declared - request.body().len();
        let to_read = remaining.min(chunk.len());

        match (&*stream).read(&mut chunk[..to_read]) {
            Ok(0) => return false,
            Ok(n) => request.push_body_bytes(&chunk[..n]),
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(_) => return false,
        }
    }

    true
}

/// Política de keep-alive
///
/// Se mantiene la conexión solo si el servidor lo tiene habilitado, la
/// versión es HTTP/1.1 y el cliente no mandó `Connection: close`.
fn should_keep_alive(ctx: &ServerContext, request: &Request) -> bool {
    if !ctx.config.keep_alive_enabled() {
        return false;
    }

    if request.version() != "HTTP/1.1" {
        return false;
    }

    match request.header("connection") {
        Some(value) if value.eq_ignore_ascii_case("close") => false,
        _ => true, // En HTTP/1.1 keep-alive es el default
    }
}

/// Chequea un pedido de upgrade h2c sobre GET
fn wants_h2c_upgrade(ctx: &ServerContext, request: &Request) -> bool {
    ctx.config.http2_enabled()
        && request.method() == "GET"
        && request
            .header("upgrade")
            .map(|v| v.eq_ignore_ascii_case("h2c"))
            .unwrap_or(false)
        && request
            .header("connection")
            .map(|v| v.to_ascii_lowercase().contains("upgrade"))
            .unwrap_or(false)
}

/// Despacha el request por método hacia las superficies de ruteo
fn route_request(ctx: &ServerContext, request: &Request) -> Response {
    match request.method() {
        "OPTIONS" => router::preflight_response(),
        "GET" => dispatch_get(ctx, request),
        "HEAD" => dispatch_get(ctx, request).into_head(),
        "POST" => {
            if request.path().starts_with("/api") {
                router::handle_api(request, &ctx.users, server_stats(ctx))
            } else {
                Response::error_page(
                    StatusCode::MethodNotAllowed,
                    "The requested method is not allowed for this resource.",
                )
            }
        }
        _ => Response::error_page(
            StatusCode::MethodNotAllowed,
            "The requested method is not allowed for this resource.",
        ),
    }
}

fn dispatch_get(ctx: &ServerContext, request: &Request) -> Response {
    let path = request.path();

    if path == "/dashboard" || path == "/dashboard.html" {
        return router::serve_dashboard(&ctx.files);
    }

    if path.starts_with("/api") {
        return router::handle_api(request, &ctx.users, server_stats(ctx));
    }

    router::serve_static(&ctx.files, path)
}

/// Números actuales para GET /api/stats
fn server_stats(ctx: &ServerContext) -> ServerStats {
    ServerStats {
        total_requests: ctx.metrics.total_requests(),
        active_connections: ctx.connections.len() + ctx.ws.connection_count(),
        thread_count: ctx.pool.thread_count(),
        queue_size: ctx.pool.queue_size(),
    }
}

/// Serializa y envía una respuesta
fn send_response(stream: &TcpStream, response: &Response) -> bool {
    send_all(stream, &response.to_bytes())
}

/// Envía todos los bytes, tolerando desconexiones del peer
///
/// Un broken pipe o reset no se loggea: el cliente que corta en
/// paralelo no es un error del servidor.
fn send_all(stream: &TcpStream, bytes: &[u8]) -> bool {
    (&*stream).write_all(bytes).is_ok()
}

/// Registra el request en métricas y en el log
fn record(ctx: &ServerContext, method: &str, path: &str, status: u16, started: Instant) {
    if ctx.coordinator.is_shutdown_requested() {
        return;
    }

    let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
    ctx.metrics.record_request(method, path, status, duration_ms);
    println!(
        "[{:?}] {} {} - {} ({:.2}ms)",
        std::thread::current().id(),
        method,
        path,
        status,
        duration_ms
    );
}
