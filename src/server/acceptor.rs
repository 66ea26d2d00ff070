//! # Servidor y Loop de Accept
//! src/server/acceptor.rs
//!
//! El `Server` arma todos los componentes (coordinador, pool, registro,
//! tabla de conexiones, métricas, hub WebSocket) y corre el loop de
//! accept. Cada socket aceptado se encola en el pool como una clausura
//! dueña exclusiva de ese descriptor; la detección de protocolo corre
//! dentro del worker.
//!
//! El listener es no bloqueante y el loop verifica el apagado al menos
//! una vez por segundo, así `request_shutdown` siempre se observa sin
//! demora.

use crate::config::Config;
use crate::http2::Session;
use crate::metrics::{self, MetricsCollector};
use crate::router::{FileHandler, UserStore};
use crate::server::connection::{self, ConnectionTable};
use crate::server::detect::{detect_protocol, DetectedProtocol};
use crate::server::http1;
use crate::server::registry::SocketRegistry;
use crate::shutdown::ShutdownCoordinator;
use crate::workers::WorkerPool;
use crate::ws::WebSocketHub;
use std::io;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Protocolo elegido por ALPN durante un handshake TLS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlpnProtocol {
    H2,
    Http11,
}

/// Capa de records TLS delegada
///
/// El servidor solo define el contrato de despacho: el handler hace el
/// handshake sobre el socket y reporta el protocolo que eligió ALPN
/// (ausencia de ALPN se reporta como HTTP/1.1).
pub trait TlsHandler: Send + Sync {
    fn negotiate(&self, stream: &TcpStream) -> io::Result<AlpnProtocol>;
}

/// Estado compartido entre el acceptor, los workers y los loops de fondo
pub struct ServerContext {
    pub config: Config,
    pub coordinator: Arc<ShutdownCoordinator>,
    pub registry: Arc<SocketRegistry>,
    pub connections: Arc<ConnectionTable>,
    pub metrics: Arc<MetricsCollector>,
    pub ws: Arc<WebSocketHub>,
    pub files: Arc<FileHandler>,
    pub users: Arc<UserStore>,
    pub pool: Arc<WorkerPool>,
    pub tls: Option<Arc<dyn TlsHandler>>,
}

/// Servidor multi-protocolo
pub struct Server {
    ctx: Arc<ServerContext>,
    listener: Option<TcpListener>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self::with_tls(config, None)
    }

    /// Variante con capa TLS delegada (habilita la detección por 0x16)
    pub fn with_tls(config: Config, tls: Option<Arc<dyn TlsHandler>>) -> Self {
        let coordinator = Arc::new(ShutdownCoordinator::new());
        let metrics = Arc::new(MetricsCollector::new());
        let ws = Arc::new(WebSocketHub::new(
            Arc::clone(&metrics),
            Arc::clone(&coordinator),
        ));
        let pool = Arc::new(WorkerPool::new(config.threads, Arc::clone(&coordinator)));
        let files = Arc::new(FileHandler::new(&config.docroot));

        let ctx = Arc::new(ServerContext {
            config,
            coordinator,
            registry: Arc::new(SocketRegistry::new()),
            connections: Arc::new(ConnectionTable::new()),
            metrics,
            ws,
            files,
            users: Arc::new(UserStore::with_sample_data()),
            pool,
            tls,
        });

        Self { ctx, listener: None }
    }

    /// Acceso al estado compartido (para tests y embedders)
    pub fn context(&self) -> Arc<ServerContext> {
        Arc::clone(&self.ctx)
    }

    /// Handle del coordinador de apagado
    pub fn coordinator(&self) -> Arc<ShutdownCoordinator> {
        Arc::clone(&self.ctx.coordinator)
    }

    /// Solicita el apagado cooperativo
    pub fn shutdown(&self) {
        self.ctx.coordinator.request_shutdown();
    }

    /// Crea el listener sin empezar a aceptar
    ///
    /// Separado de [`Server::run`] para que los tests puedan conocer el
    /// puerto efímero antes de arrancar el loop.
    pub fn bind(&mut self) -> io::Result<()> {
        let address = self.ctx.config.address();
        println!("[*] Iniciando servidor en {}", address);

        // std aplica SO_REUSEADDR en el bind sobre Unix
        let listener = TcpListener::bind(&address)?;
        listener.set_nonblocking(true)?;
        self.listener = Some(listener);
        Ok(())
    }

    /// Dirección local efectiva del listener
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Corre el servidor hasta que se solicite el apagado
    ///
    /// Bloquea el thread actual. Retorna `Ok(())` tras un drenaje
    /// limpio; los errores de inicialización (bind) se propagan.
    pub fn run(&mut self) -> io::Result<()> {
        if self.listener.is_none() {
            self.bind()?;
        }
        let listener = match self.listener.take() {
            Some(listener) => listener,
            None => return Err(io::Error::new(io::ErrorKind::Other, "listener not bound")),
        };

        let address = listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| self.ctx.config.address());
        println!("[+] Servidor escuchando en {}", address);
        println!("[+] API disponible en /api/");
        println!("[+] Dashboard: http://{}/dashboard", address);

        self.start_background_loops();

        // Loop principal de accept
        while !self.ctx.coordinator.is_shutdown_requested() {
            match listener.accept() {
                Ok((socket, peer)) => {
                    if self.ctx.coordinator.is_shutdown_requested() {
                        break;
                    }
                    println!("[*] Nueva conexión desde {}", peer);
                    self.dispatch(socket);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    // Paso de polling: chequear apagado y reintentar
                    self.ctx
                        .coordinator
                        .wait_for_shutdown(Duration::from_millis(50));
                }
                Err(e) => {
                    // EMFILE y similares: loggear y seguir aceptando
                    eprintln!("[!] Accept falló: {}", e);
                    self.ctx
                        .coordinator
                        .wait_for_shutdown(Duration::from_millis(50));
                }
            }
        }

        self.cleanup();
        Ok(())
    }

    /// Lanza reaper, sampler de métricas y los loops del hub WebSocket
    fn start_background_loops(&self) {
        self.ctx.ws.start();

        // Sampler de métricas del sistema (un snapshot por segundo)
        {
            let ctx = Arc::clone(&self.ctx);
            ctx.coordinator.thread_started();
            let metrics = Arc::clone(&ctx.metrics);
            let coordinator = Arc::clone(&ctx.coordinator);
            thread::Builder::new()
                .name("metrics-sampler".to_string())
                .spawn(move || {
                    metrics::sampler_loop(metrics, coordinator, move || {
                        (
                            ctx.connections.len() + ctx.ws.connection_count(),
                            ctx.pool.queue_size(),
                            ctx.pool.thread_count(),
                        )
                    })
                })
                .expect("no se pudo crear el thread del sampler");
        }

        // Reaper de conexiones keep-alive ociosas
        if self.ctx.config.keep_alive_enabled() {
            self.ctx.coordinator.thread_started();
            let table = Arc::clone(&self.ctx.connections);
            let registry = Arc::clone(&self.ctx.registry);
            let coordinator = Arc::clone(&self.ctx.coordinator);
            let timeout = Duration::from_secs(self.ctx.config.timeout_secs);
            thread::Builder::new()
                .name("conn-reaper".to_string())
                .spawn(move || connection::reaper_loop(table, registry, coordinator, timeout))
                .expect("no se pudo crear el thread del reaper");
        }
    }

    /// Configura el socket aceptado y lo encola en el pool
    fn dispatch(&self, socket: TcpStream) {
        // Timeouts del descriptor: 30 s para enviar, lectura con paso de
        // 1 segundo para que los loops observen el apagado
        let _ = socket.set_write_timeout(Some(Duration::from_secs(30)));
        let _ = socket.set_read_timeout(Some(Duration::from_secs(1)));

        let stream = Arc::new(socket);
        let conn_id = self.ctx.registry.register(&stream);

        if self.ctx.config.keep_alive_enabled() {
            self.ctx.connections.touch(conn_id);
        }

        let ctx = Arc::clone(&self.ctx);
        self.ctx.pool.execute(move || {
            handle_client(ctx, stream, conn_id);
        });
    }

    /// Secuencia de teardown tras la señal de apagado
    fn cleanup(&self) {
        println!("[*] Apagando servidor...");

        // Los loops del hub salen de inmediato (coordinador señalado)
        self.ctx.ws.stop();

        // El pool termina la tarea en curso y se detiene acotado
        self.ctx.pool.stop();

        // Interrumpir los sockets que sigan vivos y vaciar la tabla
        self.ctx.registry.force_close_all();
        self.ctx.connections.clear();

        if !self
            .ctx
            .coordinator
            .wait_for_all_threads(Duration::from_secs(3))
        {
            println!("[!] Algunos threads no salieron a tiempo, teardown forzado");
            self.ctx.registry.force_close_all();
        }

        println!("[+] Servidor apagado");
    }
}

/// Tarea por conexión: detecta el protocolo y despacha al handler
///
/// La clausura es dueña exclusiva del `Arc<TcpStream>`; al retornar se
/// limpian tabla y registro y el descriptor se cierra con el último Arc.
fn handle_client(ctx: Arc<ServerContext>, stream: Arc<TcpStream>, conn_id: u64) {
    let tls_enabled = ctx.tls.is_some();
    let http2_enabled = ctx.config.http2_enabled();

    let detected = detect_protocol(&stream, tls_enabled, http2_enabled, &ctx.coordinator);

    match detected {
        Ok(Some(DetectedProtocol::Http1 { initial })) => {
            http1::handle_connection(&ctx, Arc::clone(&stream), conn_id, initial);
        }
        Ok(Some(DetectedProtocol::Http2 { residual })) => {
            println!("[*] Conexión HTTP/2 detectada (preface)");
            let session = Session::new(Arc::clone(&ctx.files), Arc::clone(&ctx.metrics));
            session.run(&stream, &residual, &ctx.coordinator);
        }
        Ok(Some(DetectedProtocol::Tls)) => {
            handle_tls_client(&ctx, &stream);
        }
        Ok(None) => {} // El peer cerró sin mandar nada
        Err(e) => {
            if !ctx.coordinator.is_shutdown_requested() {
                eprintln!("[!] Error leyendo la conexión {}: {}", conn_id, e);
            }
        }
    }

    ctx.connections.remove(conn_id);
    ctx.registry.unregister(conn_id);
}

/// Despacho por ALPN de una conexión TLS
///
/// La capa de records es del handler delegado; acá solo se rutea el
/// protocolo negociado.
fn handle_tls_client(ctx: &ServerContext, stream: &TcpStream) {
    let handler = match &ctx.tls {
        Some(handler) => Arc::clone(handler),
        None => return,
    };

    match handler.negotiate(stream) {
        Ok(AlpnProtocol::H2) if ctx.config.http2_enabled() => {
            println!("[*] ALPN negoció h2");
        }
        Ok(_) => {
            println!("[*] ALPN negoció http/1.1");
        }
        Err(_) => return,
    }

    // El transporte de records TLS no está implementado: el contrato
    // termina en el despacho por ALPN
    println!("[!] HTTP sobre TLS no disponible todavía");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener as StdListener;

    struct FakeTls(AlpnProtocol);

    impl TlsHandler for FakeTls {
        fn negotiate(&self, _stream: &TcpStream) -> io::Result<AlpnProtocol> {
            Ok(self.0)
        }
    }

    fn test_config(docroot: &str) -> Config {
        let mut config = Config::default();
        config.port = 0;
        config.docroot = docroot.to_string();
        config.threads = 2;
        config
    }

    #[test]
    fn test_server_builds_all_components() {
        let server = Server::new(test_config("/tmp"));
        let ctx = server.context();

        assert_eq!(ctx.pool.thread_count(), 2);
        assert_eq!(ctx.connections.len(), 0);
        assert_eq!(ctx.registry.socket_count(), 0);
        assert!(!ctx.coordinator.is_shutdown_requested());
        assert!(ctx.tls.is_none());

        server.shutdown();
        ctx.pool.stop();
    }

    #[test]
    fn test_tls_dispatch_contract() {
        let handler: Arc<dyn TlsHandler> = Arc::new(FakeTls(AlpnProtocol::H2));
        let server = Server::with_tls(test_config("/tmp"), Some(handler));
        let ctx = server.context();

        // El handler delegado resuelve el protocolo
        let listener = StdListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let _client = TcpStream::connect(addr).unwrap();
        let (server_side, _) = listener.accept().unwrap();

        let negotiated = ctx.tls.as_ref().unwrap().negotiate(&server_side).unwrap();
        assert_eq!(negotiated, AlpnProtocol::H2);

        server.shutdown();
        ctx.pool.stop();
    }

    #[test]
    fn test_shutdown_flag_reaches_context() {
        let server = Server::new(test_config("/tmp"));
        server.shutdown();
        assert!(server.context().coordinator.is_shutdown_requested());
        server.context().pool.stop();
    }
}
