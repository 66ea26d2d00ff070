//! # RedUnix Multi-Protocol Server
//! src/lib.rs
//!
//! Servidor HTTP multi-protocolo implementado desde cero para
//! demostrar conceptos de sistemas operativos: concurrencia,
//! sincronización, apagado cooperativo y manejo de recursos.
//!
//! Cada conexión TCP aceptada se despacha a uno de tres handlers según
//! sus primeros bytes: HTTP/1.1 (con keep-alive), HTTP/2 cleartext
//! (detección del preface) o WebSocket (vía Upgrade de HTTP/1.1).
//!
//! ## Arquitectura
//!
//! El servidor está dividido en módulos especializados:
//! - `http`: parsing y construcción del protocolo HTTP/1.x
//! - `http2`: framing, sesión, flow control y server push del RFC 7540
//! - `ws`: handshake, codec de frames y hub de WebSockets (RFC 6455)
//! - `server`: acceptor, detección de protocolo y ciclo de conexiones
//! - `router`: archivos estáticos y API REST
//! - `workers`: pool de threads con cola acotada
//! - `shutdown`: coordinador de apagado cooperativo
//! - `metrics`: historiales acotados y exports JSON
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use redunix_server::config::Config;
//! use redunix_server::server::Server;
//!
//! let config = Config::default();
//! let mut server = Server::new(config);
//! server.run().expect("Error al iniciar servidor");
//! ```

pub mod config;
pub mod http;
pub mod http2;
pub mod metrics;
pub mod router;
pub mod server;
pub mod shutdown;
pub mod workers;
pub mod ws;
