//! # Detección de Protocolo
//! src/server/detect.rs
//!
//! Decide el protocolo de una conexión recién aceptada a partir de sus
//! primeros bytes, en este orden:
//!
//! 1. Si TLS está habilitado y el primer byte es `0x16` (record de
//!    handshake TLS), la conexión se entrega al handler TLS que resuelve
//!    el protocolo final por ALPN.
//! 2. Si HTTP/2 cleartext está habilitado y los primeros 24 bytes son
//!    exactamente el preface `PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n`, la
//!    conexión va a la sesión HTTP/2 con el preface ya consumido; los
//!    bytes restantes del buffer se reenvían como primer dato de frames.
//! 3. En cualquier otro caso el buffer es el inicio de un request
//!    HTTP/1.1.
//!
//! El resultado es una variante etiquetada que el dispatcher resuelve
//! con un `match` simple.

use crate::http2::frame::CONNECTION_PREFACE;
use crate::shutdown::ShutdownCoordinator;
use std::io::{self, Read};
use std::net::TcpStream;
use std::time::{Duration, Instant};

/// Byte inicial de un record de handshake TLS
const TLS_HANDSHAKE_BYTE: u8 = 0x16;

/// Plazo total para que el peer envíe los primeros bytes
const DETECT_DEADLINE: Duration = Duration::from_secs(5);

/// Protocolo decidido para una conexión
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectedProtocol {
    /// HTTP/1.1: `initial` contiene todo lo leído (inicio del request)
    Http1 { initial: Vec<u8> },

    /// HTTP/2 cleartext: el preface fue consumido, `residual` contiene
    /// los bytes que llegaron después y deben alimentar el decoder
    Http2 { residual: Vec<u8> },

    /// Handshake TLS: la capa de records decide el protocolo por ALPN
    Tls,
}

/// Lee los primeros bytes del socket y clasifica la conexión
///
/// Retorna `Ok(None)` si el peer cerró sin enviar nada. Los reads usan
/// el timeout de 1 segundo del socket como paso de polling para que el
/// apagado se observe sin demora.
pub fn detect_protocol(
    stream: &TcpStream,
    tls_enabled: bool,
    http2_enabled: bool,
    coordinator: &ShutdownCoordinator,
) -> io::Result<Option<DetectedProtocol>> {
    let mut buffer = Vec::with_capacity(4096);
    let deadline = Instant::now() + DETECT_DEADLINE;

    // Primer chunk de datos
    if !read_some(stream, &mut buffer, deadline, coordinator)? {
        return Ok(None);
    }

    if tls_enabled && buffer[0] == TLS_HANDSHAKE_BYTE {
        return Ok(Some(DetectedProtocol::Tls));
    }

    if http2_enabled {
        // Completar hasta 24 bytes mientras el buffer siga siendo un
        // prefijo estricto del preface (un request HTTP corto diverge
        // en el primer byte y no entra aquí)
        while buffer.len() < CONNECTION_PREFACE.len()
            && CONNECTION_PREFACE.starts_with(&buffer)
        {
            if !read_some(stream, &mut buffer, deadline, coordinator)? {
                break;
            }
        }

        if buffer.len() >= CONNECTION_PREFACE.len()
            && &buffer[..CONNECTION_PREFACE.len()] == CONNECTION_PREFACE
        {
            let residual = buffer[CONNECTION_PREFACE.len()..].to_vec();
            return Ok(Some(DetectedProtocol::Http2 { residual }));
        }
    }

    Ok(Some(DetectedProtocol::Http1 { initial: buffer }))
}

/// Lee al menos un byte más dentro del plazo
///
/// Retorna `Ok(false)` en EOF o si venció el plazo / se pidió apagado.
fn read_some(
    stream: &TcpStream,
    buffer: &mut Vec<u8>,
    deadline: Instant,
    coordinator: &ShutdownCoordinator,
) -> io::Result<bool> {
    let mut chunk = [0u8; 4096];

    loop {
        if coordinator.is_shutdown_requested() || Instant::now() > deadline {
            return Ok(false);
        }

        match (&*stream).read(&mut chunk) {
            Ok(0) => return Ok(false),
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                return Ok(true);
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut =>
            {
                // Paso de polling: volver a chequear apagado y plazo
                continue;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;
    use std::sync::Arc;

    fn socket_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server_side, _) = listener.accept().unwrap();
        server_side
            .set_read_timeout(Some(Duration::from_millis(100)))
            .unwrap();
        (server_side, client)
    }

    #[test]
    fn test_detects_http2_preface() {
        let (server, mut client) = socket_pair();
        let coordinator = Arc::new(ShutdownCoordinator::new());

        client.write_all(CONNECTION_PREFACE).unwrap();
        client.write_all(b"extra").unwrap();
        client.flush().unwrap();
        std::thread::sleep(Duration::from_millis(50));

        let detected = detect_protocol(&server, false, true, &coordinator)
            .unwrap()
            .unwrap();
        assert_eq!(
            detected,
            DetectedProtocol::Http2 {
                residual: b"extra".to_vec()
            }
        );
    }

    #[test]
    fn test_detects_http1_request() {
        let (server, mut client) = socket_pair();
        let coordinator = Arc::new(ShutdownCoordinator::new());

        client.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();

        let detected = detect_protocol(&server, false, true, &coordinator)
            .unwrap()
            .unwrap();
        match detected {
            DetectedProtocol::Http1 { initial } => {
                assert!(initial.starts_with(b"GET / HTTP/1.1"));
            }
            other => panic!("se esperaba Http1, se obtuvo {:?}", other),
        }
    }

    #[test]
    fn test_short_http1_request_is_not_misread_as_preface() {
        // Un request HTTP/1.0 de menos de 24 bytes no debe quedar
        // esperando el preface completo
        let (server, mut client) = socket_pair();
        let coordinator = Arc::new(ShutdownCoordinator::new());

        client.write_all(b"GET / HTTP/1.0\r\n\r\n").unwrap();
        drop(client);

        let detected = detect_protocol(&server, false, true, &coordinator)
            .unwrap()
            .unwrap();
        assert!(matches!(detected, DetectedProtocol::Http1 { .. }));
    }

    #[test]
    fn test_preface_ignored_when_http2_disabled() {
        let (server, mut client) = socket_pair();
        let coordinator = Arc::new(ShutdownCoordinator::new());

        client.write_all(CONNECTION_PREFACE).unwrap();

        let detected = detect_protocol(&server, false, false, &coordinator)
            .unwrap()
            .unwrap();
        assert!(matches!(detected, DetectedProtocol::Http1 { .. }));
    }

    #[test]
    fn test_detects_tls_first_byte() {
        let (server, mut client) = socket_pair();
        let coordinator = Arc::new(ShutdownCoordinator::new());

        client.write_all(&[0x16, 0x03, 0x01, 0x00, 0x05]).unwrap();

        let detected = detect_protocol(&server, true, true, &coordinator)
            .unwrap()
            .unwrap();
        assert_eq!(detected, DetectedProtocol::Tls);
    }

    #[test]
    fn test_tls_byte_without_tls_enabled_falls_to_http1() {
        let (server, mut client) = socket_pair();
        let coordinator = Arc::new(ShutdownCoordinator::new());

        client.write_all(&[0x16, 0x03, 0x01]).unwrap();

        let detected = detect_protocol(&server, false, false, &coordinator)
            .unwrap()
            .unwrap();
        assert!(matches!(detected, DetectedProtocol::Http1 { .. }));
    }

    #[test]
    fn test_peer_close_without_data() {
        let (server, client) = socket_pair();
        let coordinator = Arc::new(ShutdownCoordinator::new());
        drop(client);

        let detected = detect_protocol(&server, false, true, &coordinator).unwrap();
        assert!(detected.is_none());
    }
}
