//! # Pool de Workers
//! src/workers/mod.rs
//!
//! Conjunto fijo de threads que consume una cola FIFO de tareas. Cada
//! conexión aceptada se encola como una clausura dueña de su socket.
//!
//! Reglas del pool:
//!
//! - Después de solicitado el apagado las tareas nuevas se descartan en
//!   silencio.
//! - Los workers esperan con timeout corto (100 ms) para observar el
//!   apagado sin quedar bloqueados.
//! - Un panic dentro de una tarea no mata al worker: se captura en el
//!   borde de la tarea y se loggea, salvo durante el drenaje.
//! - `stop()` tiene presupuesto acotado: los workers que no salgan a
//!   tiempo se abandonan en lugar de bloquear el apagado.

use crate::shutdown::ShutdownCoordinator;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Unidad de trabajo: clausura que posee todos sus recursos
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Estado compartido entre los workers
struct PoolShared {
    queue: Mutex<VecDeque<Task>>,
    condvar: Condvar,
    stop_flag: AtomicBool,
    alive_workers: AtomicUsize,
}

/// Pool de threads de tamaño fijo
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    thread_count: usize,
    coordinator: Arc<ShutdownCoordinator>,
}

impl WorkerPool {
    /// Crea el pool y lanza `num_threads` workers de inmediato
    pub fn new(num_threads: usize, coordinator: Arc<ShutdownCoordinator>) -> Self {
        let shared = Arc::new(PoolShared {
            queue: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
            stop_flag: AtomicBool::new(false),
            alive_workers: AtomicUsize::new(num_threads),
        });

        let mut workers = Vec::with_capacity(num_threads);
        for i in 0..num_threads {
            let shared = Arc::clone(&shared);
            let coordinator = Arc::clone(&coordinator);
            let handle = thread::Builder::new()
                .name(format!("worker-{}", i))
                .spawn(move || worker_loop(shared, coordinator))
                .expect("no se pudo crear el thread del worker");
            workers.push(handle);
        }

        println!("[+] Pool de workers creado con {} threads", num_threads);

        Self {
            shared,
            workers: Mutex::new(workers),
            thread_count: num_threads,
            coordinator,
        }
    }

    /// Encola una tarea para ejecución
    ///
    /// Si el pool está detenido o el servidor en drenaje, la tarea se
    /// descarta en silencio.
    pub fn execute<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.shared.stop_flag.load(Ordering::SeqCst) || self.coordinator.is_shutdown_requested()
        {
            return;
        }

        {
            let mut queue = self.shared.queue.lock().unwrap();
            if self.shared.stop_flag.load(Ordering::SeqCst) {
                return;
            }
            queue.push_back(Box::new(task));
        }

        self.shared.condvar.notify_one();
    }

    /// Cantidad de workers del pool
    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    /// Tareas pendientes en la cola
    pub fn queue_size(&self) -> usize {
        self.shared.queue.lock().unwrap().len()
    }

    /// Detiene el pool con presupuesto acotado
    ///
    /// Marca el stop flag, despierta a todos los workers y espera su
    /// salida hasta 3 segundos en total. Los handles de los workers que
    /// no salieron se abandonan: el apagado nunca se bloquea aquí.
    pub fn stop(&self) {
        self.shared.stop_flag.store(true, Ordering::SeqCst);
        self.shared.condvar.notify_all();

        let deadline = Instant::now() + Duration::from_secs(3);
        while self.shared.alive_workers.load(Ordering::SeqCst) > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }

        let mut workers = self.workers.lock().unwrap();
        if self.shared.alive_workers.load(Ordering::SeqCst) == 0 {
            for handle in workers.drain(..) {
                let _ = handle.join();
            }
            println!("[+] Pool de workers detenido");
        } else {
            let remaining = self.shared.alive_workers.load(Ordering::SeqCst);
            workers.clear();
            println!(
                "[!] {} workers no salieron a tiempo, abandonando handles",
                remaining
            );
        }
    }
}

/// Loop de cada worker
///
/// Espera con timeout de 100 ms para observar el stop flag, toma una
/// tarea y la ejecuta bajo `catch_unwind`.
fn worker_loop(shared: Arc<PoolShared>, coordinator: Arc<ShutdownCoordinator>) {
    loop {
        let task = {
            let mut queue = shared.queue.lock().unwrap();

            loop {
                if let Some(task) = queue.pop_front() {
                    break Some(task);
                }

                if shared.stop_flag.load(Ordering::SeqCst) {
                    break None;
                }

                let (guard, _timeout) = shared
                    .condvar
                    .wait_timeout(queue, Duration::from_millis(100))
                    .unwrap();
                queue = guard;
            }
        };

        match task {
            Some(task) => {
                let result = catch_unwind(AssertUnwindSafe(task));
                if result.is_err() && !coordinator.is_shutdown_requested() {
                    eprintln!("[!] Una tarea del worker terminó en panic");
                }
            }
            None => break,
        }

        if shared.stop_flag.load(Ordering::SeqCst) && shared.queue.lock().unwrap().is_empty() {
            break;
        }
    }

    shared.alive_workers.fetch_sub(1, Ordering::SeqCst);
}
