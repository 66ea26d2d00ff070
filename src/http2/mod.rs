//! # Subsistema HTTP/2
//! src/http2/mod.rs
//!
//! Implementa HTTP/2 cleartext del RFC 7540:
//!
//! - `frame`: framing binario (header de 9 bytes, builders de frames)
//! - `stream`: estado por stream, registro de prioridad y cursor de
//!   emisión
//! - `session`: máquina de estados de la conexión, flow control,
//!   intercambio HPACK (delegado en `loona-hpack`) y server push
//!
//! El preface de 24 bytes lo detecta el dispatcher del servidor; la
//! sesión recibe los bytes residuales ya sin preface. El camino de
//! upgrade h2c usa [`session::Session::expect_preface`] porque ahí el
//! preface sí llega por el socket.

pub mod frame;
pub mod session;
pub mod stream;

pub use session::{H2Error, Session, Settings};
pub use stream::{Priority, Stream};
