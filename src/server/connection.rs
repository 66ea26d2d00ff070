//! # Tabla de Conexiones Keep-Alive
//! src/server/connection.rs
//!
//! Mapa de id de conexión → timestamp de última actividad. El reaper
//! recorre la tabla cada segundo y desaloja las entradas más viejas que
//! el timeout de keep-alive.
//!
//! Invariante de cierre: una conexión nunca se interrumpe mientras sigue
//! en la tabla. `take_expired` primero remueve las entradas vencidas y
//! recién después el caller interrumpe los sockets, evitando la carrera
//! de doble cierre con el handler dueño.

use crate::server::registry::SocketRegistry;
use crate::shutdown::ShutdownCoordinator;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Tabla de última actividad por conexión
pub struct ConnectionTable {
    entries: Mutex<HashMap<u64, Instant>>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Inserta o refresca el timestamp de una conexión
    pub fn touch(&self, id: u64) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(id, Instant::now());
    }

    /// Quita una conexión de la tabla
    pub fn remove(&self, id: u64) {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(&id);
    }

    /// Conexiones actualmente registradas
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remueve y retorna las conexiones sin actividad por más de `timeout`
    pub fn take_expired(&self, timeout: Duration) -> Vec<u64> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();

        let expired: Vec<u64> = entries
            .iter()
            .filter(|(_, last)| now.duration_since(**last) > timeout)
            .map(|(id, _)| *id)
            .collect();

        for id in &expired {
            entries.remove(id);
        }

        expired
    }

    /// Vacía la tabla (limpieza final del apagado)
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

impl Default for ConnectionTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Loop del reaper de conexiones ociosas
///
/// Corre en su propio thread solo cuando keep-alive está habilitado.
/// Cada iteración espera un segundo (o la señal de apagado), desaloja
/// las entradas vencidas y recién entonces interrumpe los sockets a
/// través del registro.
pub fn reaper_loop(
    table: Arc<ConnectionTable>,
    registry: Arc<SocketRegistry>,
    coordinator: Arc<ShutdownCoordinator>,
    timeout: Duration,
) {
    while !coordinator.is_shutdown_requested() {
        if coordinator.wait_for_shutdown(Duration::from_secs(1)) {
            break;
        }

        let expired = table.take_expired(timeout);
        for id in expired {
            registry.interrupt(id);
            registry.unregister(id);
            println!("[*] Conexión ociosa cerrada: {}", id);
        }
    }

    coordinator.thread_exiting();
}
