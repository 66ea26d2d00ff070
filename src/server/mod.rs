//! # Módulo del Servidor
//! src/server/mod.rs
//!
//! Este módulo implementa el núcleo de red del servidor:
//!
//! 1. `acceptor`: listener TCP, loop de accept y despacho al pool
//! 2. `detect`: detección de protocolo por los primeros bytes
//! 3. `http1`: loop de conexión HTTP/1.1 con keep-alive y upgrades
//! 4. `connection`: tabla de última actividad y reaper de ociosas
//! 5. `registry`: membresía débil de sockets para el teardown forzado
//!
//! Jerarquía de locks de los recursos compartidos (orden estricto,
//! nunca se toman dos a la vez): Registro → Tabla de Conexiones →
//! mapa WebSocket → tabla de Streams → Métricas.

pub mod acceptor;
pub mod connection;
pub mod detect;
pub mod http1;
pub mod registry;

// Re-exportar para facilitar el uso
pub use acceptor::{AlpnProtocol, Server, ServerContext, TlsHandler};
pub use connection::ConnectionTable;
pub use detect::DetectedProtocol;
pub use registry::SocketRegistry;
