//! # Registro de Sockets
//! src/server/registry.rs
//!
//! Conjunto de los descriptores de cliente actualmente abiertos. El
//! dueño real de cada socket es su tarea handler (que sostiene el
//! `Arc<TcpStream>`); el registro solo guarda membresía débil para el
//! teardown forzado del apagado.
//!
//! Jerarquía de locks: el mutex del registro es el primero del orden
//! Registro → Tabla de Conexiones → mapa WebSocket → tabla de Streams →
//! Métricas. Ninguna operación toma dos de estos a la vez.

use std::collections::HashMap;
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Registro de sockets abiertos con handles débiles
pub struct SocketRegistry {
    sockets: Mutex<HashMap<u64, Weak<TcpStream>>>,
    next_id: AtomicU64,
}

impl SocketRegistry {
    pub fn new() -> Self {
        Self {
            sockets: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registra un socket y retorna su id de conexión
    pub fn register(&self, stream: &Arc<TcpStream>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut sockets = self.sockets.lock().unwrap();
        sockets.insert(id, Arc::downgrade(stream));
        id
    }

    /// Quita un socket del registro (el dueño lo cierra al soltar su Arc)
    pub fn unregister(&self, id: u64) {
        let mut sockets = self.sockets.lock().unwrap();
        sockets.remove(&id);
    }

    /// Interrumpe un socket específico sin cerrarlo
    ///
    /// El `shutdown(Both)` hace que el dueño observe EOF en su próximo
    /// read y salga por su cuenta; el descriptor se cierra una única vez
    /// cuando el último `Arc` se suelta.
    pub fn interrupt(&self, id: u64) {
        let stream = {
            let sockets = self.sockets.lock().unwrap();
            sockets.get(&id).and_then(|weak| weak.upgrade())
        };

        if let Some(stream) = stream {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    /// Interrumpe todos los sockets vivos y limpia el registro
    ///
    /// Se usa solo en el teardown forzado, cuando los handlers no
    /// salieron dentro del plazo.
    pub fn force_close_all(&self) {
        let survivors: Vec<Arc<TcpStream>> = {
            let mut sockets = self.sockets.lock().unwrap();
            let survivors = sockets.values().filter_map(|weak| weak.upgrade()).collect();
            sockets.clear();
            survivors
        };

        // shutdown fuera del lock
        for stream in survivors {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    /// Cantidad de sockets cuyo dueño sigue vivo
    pub fn socket_count(&self) -> usize {
        let sockets = self.sockets.lock().unwrap();
        sockets.values().filter(|weak| weak.strong_count() > 0).count()
    }
}

impl Default for SocketRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;

    fn socket_pair() -> (Arc<TcpStream>, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server_side, _) = listener.accept().unwrap();
        (Arc::new(server_side), client)
    }

    #[test]
    fn test_register_and_unregister() {
        let registry = SocketRegistry::new();
        let (stream, _client) = socket_pair();

        let id = registry.register(&stream);
        assert_eq!(registry.socket_count(), 1);

        registry.unregister(id);
        assert_eq!(registry.socket_count(), 0);
    }

    #[test]
    fn test_weak_membership_does_not_keep_socket_alive() {
        let registry = SocketRegistry::new();
        let (stream, _client) = socket_pair();

        registry.register(&stream);
        drop(stream); // El dueño suelta el socket

        assert_eq!(registry.socket_count(), 0);
    }

    #[test]
    fn test_force_close_all_interrupts_owner() {
        let registry = SocketRegistry::new();
        let (stream, mut client) = socket_pair();
        registry.register(&stream);

        registry.force_close_all();

        // El peer observa EOF tras el shutdown
        client
            .set_read_timeout(Some(std::time::Duration::from_secs(2)))
            .unwrap();
        let mut buf = [0u8; 16];
        let n = client.read(&mut buf).unwrap_or(0);
        assert_eq!(n, 0);
        assert_eq!(registry.socket_count(), 0);
    }

    #[test]
    fn test_ids_are_unique() {
        let registry = SocketRegistry::new();
        let (a, _ca) = socket_pair();
        let (b, _cb) = socket_pair();

        let id_a = registry.register(&a);
        let id_b = registry.register(&b);
        assert_ne!(id_a, id_b);
    }
}
