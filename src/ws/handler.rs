//! # Hub de Conexiones WebSocket
//! src/ws/handler.rs
//!
//! Administra el mapa de conexiones WebSocket y los dos loops de fondo
//! del subsistema:
//!
//! - **Broadcast**: cada segundo envía el snapshot `system_metrics` a
//!   todos los clientes; cada quinta iteración agrega `request_rate`.
//! - **Ping**: cada 30 segundos envía un ping a cada cliente; el éxito
//!   refresca `last_ping`, la falla desaloja la conexión.
//!
//! El mapa de conexiones tiene su propio mutex (tercero en la jerarquía
//! de locks). Los envíos ocurren fuera de ese lock: cada conexión lleva
//! un mutex de escritura propio que serializa los frames hacia su
//! socket, así una respuesta de comando nunca se entrelaza con un
//! broadcast.

use crate::metrics::MetricsCollector;
use crate::shutdown::ShutdownCoordinator;
use crate::ws::frame::{self, Frame, OpCode};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Conexión WebSocket registrada en el hub
struct WsConnection {
    stream: Arc<TcpStream>,

    /// Serializa las escrituras al socket (frames atómicos)
    writer: Arc<Mutex<()>>,

    /// Última vez que el ping loop alcanzó a este cliente
    last_ping: Instant,
}

/// Hub de WebSockets con sus loops de fondo
pub struct WebSocketHub {
    connections: Mutex<HashMap<String, WsConnection>>,
    metrics: Arc<MetricsCollector>,
    coordinator: Arc<ShutdownCoordinator>,
    client_counter: AtomicU64,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl WebSocketHub {
    pub fn new(metrics: Arc<MetricsCollector>, coordinator: Arc<ShutdownCoordinator>) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            metrics,
            coordinator,
            client_counter: AtomicU64::new(0),
            threads: Mutex::new(Vec::new()),
        }
    }

    /// Lanza los loops de broadcast y ping
    pub fn start(self: &Arc<Self>) {
        let mut threads = self.threads.lock().unwrap();

        let hub = Arc::clone(self);
        hub.coordinator.thread_started();
        threads.push(
            thread::Builder::new()
                .name("ws-broadcast".to_string())
                .spawn(move || hub.broadcast_loop())
                .expect("no se pudo crear el thread de broadcast"),
        );

        let hub = Arc::clone(self);
        hub.coordinator.thread_started();
        threads.push(
            thread::Builder::new()
                .name("ws-ping".to_string())
                .spawn(move || hub.ping_loop())
                .expect("no se pudo crear el thread de ping"),
        );
    }

    /// Genera un id único de cliente
    pub fn generate_client_id(&self) -> String {
        let counter = self.client_counter.fetch_add(1, Ordering::SeqCst);
        format!(
            "client_{}_{}",
            chrono::Utc::now().timestamp_millis(),
            counter
        )
    }

    /// Cantidad de conexiones WebSocket vivas
    pub fn connection_count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }

    /// Loop de lectura de una conexión ya upgradeada
    ///
    /// Corre en la tarea del worker que aceptó el socket y bloquea hasta
    /// que el cliente cierre, falle el protocolo o llegue el apagado. El
    /// timeout de lectura de 1 segundo del socket actúa como paso de
    /// polling para observar el apagado.
    pub fn run_connection(&self, stream: Arc<TcpStream>, client_id: String) {
        {
            let mut connections = self.connections.lock().unwrap();
            connections.insert(
                client_id.clone(),
                WsConnection {
                    stream: Arc::clone(&stream),
                    writer: Arc::new(Mutex::new(())),
                    last_ping: Instant::now(),
                },
            );
        }

        println!("[+] WebSocket conectado: {}", client_id);
        let mut buffer: Vec<u8> = Vec::with_capacity(4096);
        let mut chunk = [0u8; 4096];

        'outer: while !self.coordinator.is_shutdown_requested() {
            match (&*stream).read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => buffer.extend_from_slice(&chunk[..n]),
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(_) => break,
            }

            // Drenar todos los frames completos del buffer
            loop {
                match frame::parse_frame(&buffer, true) {
                    Ok(Some((frame, consumed))) => {
                        buffer.drain(..consumed);
                        if !self.handle_frame(&client_id, frame) {
                            break 'outer;
                        }
                    }
                    Ok(None) => break,
                    Err(_) => break 'outer,
                }
            }
        }

        self.remove_connection(&client_id);
        println!("[*] WebSocket desconectado: {}", client_id);
    }

    /// Procesa un frame entrante; retorna false para cerrar la conexión
    fn handle_frame(&self, client_id: &str, frame: Frame) -> bool {
        match frame.opcode {
            OpCode::Close => false,
            OpCode::Ping => {
                // PONG con payload vacío
                self.send_raw(client_id, OpCode::Pong, b"")
            }
            OpCode::Text => {
                // Un TEXT no final es un mensaje fragmentado: se descarta
                // sin interpretar para no actuar sobre un comando parcial
                if !frame.fin {
                    return true;
                }
                let command = String::from_utf8_lossy(&frame.payload).into_owned();
                self.handle_command(client_id, command.trim());
                true
            }
            // Binary, Continuation y Pong se parsean pero no se interpretan
            OpCode::Binary | OpCode::Continuation | OpCode::Pong => true,
        }
    }

    /// Despacha un comando de texto del dashboard
    ///
    /// La respuesta se envía al cliente que originó el comando antes de
    /// cualquier broadcast posterior.
    fn handle_command(&self, client_id: &str, command: &str) {
        let reply = match command {
            "request_metrics" => Some(self.metrics.metrics_json()),
            "request_rate" => Some(self.metrics.request_rate_json()),
            "system_metrics" => Some(self.metrics.system_metrics_json()),
            _ => None,
        };

        if let Some(json) = reply {
            self.send_raw(client_id, OpCode::Text, json.as_bytes());
        }
    }

    /// Envía un frame a un cliente puntual; la falla desaloja
    ///
    /// Retorna false si la conexión ya no existe o el envío falló.
    fn send_raw(&self, client_id: &str, opcode: OpCode, payload: &[u8]) -> bool {
        // Tomar los handles bajo el lock del mapa, enviar fuera de él
        let target = {
            let connections = self.connections.lock().unwrap();
            connections
                .get(client_id)
                .map(|c| (Arc::clone(&c.stream), Arc::clone(&c.writer)))
        };

        let (stream, writer) = match target {
            Some(pair) => pair,
            None => return false,
        };

        if send_frame(&stream, &writer, opcode, payload) {
            true
        } else {
            self.remove_connection(client_id);
            false
        }
    }

    /// Envía un frame de texto a todas las conexiones
    pub fn broadcast_text(&self, text: &str) {
        let targets: Vec<(String, Arc<TcpStream>, Arc<Mutex<()>>)> = {
            let connections = self.connections.lock().unwrap();
            connections
                .iter()
                .map(|(id, c)| (id.clone(), Arc::clone(&c.stream), Arc::clone(&c.writer)))
                .collect()
        };

        let mut dead: Vec<String> = Vec::new();
        for (id, stream, writer) in targets {
            if self.coordinator.is_shutdown_requested() {
                break;
            }
            if !send_frame(&stream, &writer, OpCode::Text, text.as_bytes()) {
                dead.push(id);
            }
        }

        for id in dead {
            self.remove_connection(&id);
        }
    }

    fn remove_connection(&self, client_id: &str) {
        let mut connections = self.connections.lock().unwrap();
        connections.remove(client_id);
    }

    /// Loop de broadcast de métricas
    fn broadcast_loop(&self) {
        let mut counter = 0u64;

        while !self.coordinator.is_shutdown_requested() {
            if self.coordinator.wait_for_shutdown(Duration::from_secs(1)) {
                break;
            }

            if self.connection_count() == 0 {
                continue;
            }

            self.broadcast_text(&self.metrics.system_metrics_json());

            counter += 1;
            if counter % 5 == 0 {
                self.broadcast_text(&self.metrics.request_rate_json());
            }
        }

        self.coordinator.thread_exiting();
    }

    /// Loop de keepalive por ping
    fn ping_loop(&self) {
        while !self.coordinator.is_shutdown_requested() {
            if self.coordinator.wait_for_shutdown(Duration::from_secs(30)) {
                break;
            }

            let targets: Vec<(String, Arc<TcpStream>, Arc<Mutex<()>>)> = {
                let connections = self.connections.lock().unwrap();
                connections
                    .iter()
                    .map(|(id, c)| (id.clone(), Arc::clone(&c.stream), Arc::clone(&c.writer)))
                    .collect()
            };

            let mut dead: Vec<String> = Vec::new();
            let mut alive: Vec<String> = Vec::new();
            for (id, stream, writer) in targets {
                if self.coordinator.is_shutdown_requested() {
                    break;
                }
                if send_frame(&stream, &writer, OpCode::Ping, b"") {
                    alive.push(id);
                } else {
                    dead.push(id);
                }
            }

            {
                let mut connections = self.connections.lock().unwrap();
                for id in dead {
                    connections.remove(&id);
                }
                let now = Instant::now();
                for id in alive {
                    if let Some(conn) = connections.get_mut(&id) {
                        conn.last_ping = now;
                    }
                }
            }
        }

        self.coordinator.thread_exiting();
    }

    /// Cierra todas las conexiones y espera los loops de fondo
    ///
    /// Debe llamarse después de `request_shutdown`: los loops despiertan
    /// de inmediato y el join no bloquea.
    pub fn stop(&self) {
        let streams: Vec<Arc<TcpStream>> = {
            let mut connections = self.connections.lock().unwrap();
            let streams = connections
                .values()
                .map(|c| Arc::clone(&c.stream))
                .collect();
            connections.clear();
            streams
        };

        for stream in streams {
            let _ = stream.shutdown(Shutdown::Both);
        }

        let mut threads = self.threads.lock().unwrap();
        for handle in threads.drain(..) {
            let _ = handle.join();
        }
    }
}

/// Escribe un frame completo bajo el lock de escritura de la conexión
///
/// Los errores de envío (broken pipe incluido) se reportan como `false`
/// sin loggear: un peer que cerró en paralelo no es una falla.
fn send_frame(stream: &TcpStream, writer: &Mutex<()>, opcode: OpCode, payload: &[u8]) -> bool {
    let bytes = frame::encode_frame(opcode, payload);
    let _guard = writer.lock().unwrap();
    (&*stream).write_all(&bytes).is_ok()
}
