//! # Coordinador de Apagado
//! src/shutdown/mod.rs
//!
//! Implementa el protocolo de apagado cooperativo del servidor. El
//! coordinador mantiene una bandera de un solo sentido
//! (RUNNING → DRAINING) y el conteo de threads de fondo activos.
//!
//! Todos los loops de fondo siguen la misma plantilla:
//!
//! ```text
//! while !coordinator.is_shutdown_requested() {
//!     if coordinator.wait_for_shutdown(periodo) { break; }
//!     // una iteración de trabajo
//! }
//! coordinator.thread_exiting();
//! ```
//!
//! El coordinador se construye una vez en `Server::new` y se comparte por
//! `Arc` con cada componente; no hay estado global.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Señal de apagado compartida entre todos los threads del servidor
pub struct ShutdownCoordinator {
    /// Bandera de un solo sentido: una vez true, nunca vuelve a false
    shutdown_requested: AtomicBool,

    /// Threads de fondo que aún no han salido
    active_threads: AtomicUsize,

    /// Mutex interno para las condvars (no participa en la jerarquía de
    /// locks de recursos compartidos)
    lock: Mutex<()>,
    shutdown_cv: Condvar,
    all_exited_cv: Condvar,
}

impl ShutdownCoordinator {
    /// Crea un coordinador en estado RUNNING sin threads registrados
    pub fn new() -> Self {
        Self {
            shutdown_requested: AtomicBool::new(false),
            active_threads: AtomicUsize::new(0),
            lock: Mutex::new(()),
            shutdown_cv: Condvar::new(),
            all_exited_cv: Condvar::new(),
        }
    }

    /// Solicita el apagado y despierta a todos los que esperan
    ///
    /// La transición es idempotente: llamadas repetidas no tienen efecto
    /// adicional.
    pub fn request_shutdown(&self) {
        {
            let _guard = self.lock.lock().unwrap();
            self.shutdown_requested.store(true, Ordering::SeqCst);
        }
        self.shutdown_cv.notify_all();
    }

    /// Verifica sin bloquear si el apagado fue solicitado
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    /// Espera la señal de apagado con timeout
    ///
    /// Retorna `true` si el apagado fue señalado dentro de `timeout`,
    /// `false` si venció el plazo. Los loops de fondo usan esto en lugar
    /// de `sleep` para poder despertar de inmediato.
    pub fn wait_for_shutdown(&self, timeout: Duration) -> bool {
        let guard = self.lock.lock().unwrap();
        let (_guard, result) = self
            .shutdown_cv
            .wait_timeout_while(guard, timeout, |_| {
                !self.shutdown_requested.load(Ordering::SeqCst)
            })
            .unwrap();
        !result.timed_out()
    }

    /// Registra un thread de fondo recién creado
    pub fn thread_started(&self) {
        self.active_threads.fetch_add(1, Ordering::SeqCst);
    }

    /// Notifica que un thread de fondo está por salir
    ///
    /// Cuando el contador llega a cero se despierta a quien espere en
    /// [`ShutdownCoordinator::wait_for_all_threads`].
    pub fn thread_exiting(&self) {
        let previous = self.active_threads.fetch_sub(1, Ordering::SeqCst);
        if previous == 1 {
            let _guard = self.lock.lock().unwrap();
            self.all_exited_cv.notify_all();
        }
    }

    /// Cantidad de threads de fondo aún activos
    pub fn active_threads(&self) -> usize {
        self.active_threads.load(Ordering::SeqCst)
    }

    /// Espera acotada a que todos los threads registrados salgan
    ///
    /// Retorna `true` si el contador llegó a cero dentro del plazo. Si
    /// retorna `false` el caller debe escalar a teardown forzado (cerrar
    /// sockets y abandonar los handles) en lugar de bloquear.
    pub fn wait_for_all_threads(&self, timeout: Duration) -> bool {
        let guard = self.lock.lock().unwrap();
        let (_guard, result) = self
            .all_exited_cv
            .wait_timeout_while(guard, timeout, |_| {
                self.active_threads.load(Ordering::SeqCst) > 0
            })
            .unwrap();
        !result.timed_out()
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
