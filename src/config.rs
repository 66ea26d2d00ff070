//! # Configuración del Servidor
//! src/config.rs
//!
//! Este módulo define la configuración del servidor multi-protocolo con
//! soporte completo para argumentos CLI y variables de entorno.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./redunix_server --port 8080 \
//!   --docroot ./www \
//!   --threads 4 \
//!   --timeout 5
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! HTTP_PORT=8080 HTTP_HOST=0.0.0.0 ./redunix_server
//! ```

use clap::Parser;

/// Configuración del servidor multi-protocolo
#[derive(Debug, Clone, Parser)]
#[command(name = "redunix_server")]
#[command(about = "Servidor HTTP multi-protocolo (HTTP/1.1, HTTP/2, WebSocket)")]
#[command(version = "0.1.0")]
pub struct Config {
    /// Puerto en el que escucha el servidor
    #[arg(short, long, default_value = "8080", env = "HTTP_PORT")]
    pub port: u16,

    /// Host/IP en el que escucha
    #[arg(long, default_value = "127.0.0.1", env = "HTTP_HOST")]
    pub host: String,

    /// Document root para archivos estáticos
    #[arg(short = 'd', long, default_value = "./www", env = "DOC_ROOT")]
    pub docroot: String,

    /// Tamaño del pool de workers
    #[arg(short = 't', long, default_value = "4", env = "HTTP_THREADS")]
    pub threads: usize,

    /// Habilita keep-alive en HTTP/1.1 (por defecto activo)
    #[arg(long = "keep-alive", default_value_t = true)]
    pub keep_alive: bool,

    /// Deshabilita keep-alive
    #[arg(long = "no-keep-alive", default_value_t = false)]
    pub no_keep_alive: bool,

    /// Timeout de keep-alive en segundos
    #[arg(short = 'T', long = "timeout", default_value = "5", env = "KEEP_ALIVE_TIMEOUT")]
    pub timeout_secs: u64,

    /// Habilita HTTP/2 cleartext (por defecto activo)
    #[arg(long = "http2", default_value_t = true)]
    pub http2: bool,

    /// Deshabilita HTTP/2
    #[arg(long = "no-http2", default_value_t = false)]
    pub no_http2: bool,

    /// Path del endpoint WebSocket
    #[arg(long = "ws-path", default_value = "/ws", env = "WS_PATH")]
    pub ws_path: String,
}

impl Config {
    /// Crea una nueva configuración parseando argumentos CLI
    pub fn new() -> Self {
        Config::parse()
    }

    /// Obtiene la dirección completa para bind (host:port)
    ///
    /// # Ejemplo
    /// ```rust
    /// use redunix_server::config::Config;
    ///
    /// let config = Config::default();
    /// assert_eq!(config.address(), "127.0.0.1:8080");
    /// ```
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Keep-alive efectivo (`--no-keep-alive` gana sobre el default)
    pub fn keep_alive_enabled(&self) -> bool {
        self.keep_alive && !self.no_keep_alive
    }

    /// HTTP/2 efectivo (`--no-http2` gana sobre el default)
    pub fn http2_enabled(&self) -> bool {
        self.http2 && !self.no_http2
    }

    /// Verifica si un path es el endpoint WebSocket
    pub fn is_websocket_path(&self, path: &str) -> bool {
        path == self.ws_path || path == "/websocket"
    }

    /// Valida la configuración
    ///
    /// Retorna errores si hay valores inválidos
    pub fn validate(&self) -> Result<(), String> {
        if self.threads == 0 {
            return Err("Thread count must be >= 1".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("Keep-alive timeout must be > 0".to_string());
        }

        if self.docroot.is_empty() {
            return Err("Document root must not be empty".to_string());
        }

        if !self.ws_path.starts_with('/') {
            return Err("WebSocket path must start with '/'".to_string());
        }

        Ok(())
    }

    /// Imprime un resumen de la configuración
    pub fn print_summary(&self) {
        println!("╔══════════════════════════════════════════════════════════════╗");
        println!("║        RedUnix Multi-Protocol Server Configuration           ║");
        println!("╚══════════════════════════════════════════════════════════════╝");
        println!();
        println!("🌐 Network:");
        println!("   Address:      {}", self.address());
        println!("   Docroot:      {}", self.docroot);
        println!("   Workers:      {}", self.threads);
        println!();
        println!("🔀 Protocols:");
        println!("   HTTP/1.1:     enabled");
        println!(
            "   Keep-Alive:   {} (timeout: {} s)",
            if self.keep_alive_enabled() { "enabled" } else { "disabled" },
            self.timeout_secs
        );
        println!(
            "   HTTP/2:       {}",
            if self.http2_enabled() { "enabled (h2c + preface)" } else { "disabled" }
        );
        println!("   WebSocket:    {} (y /websocket)", self.ws_path);
        println!();
        println!("═══════════════════════════════════════════════════════════════");
        println!();
    }
}

impl Default for Config {
    /// Configuración por defecto
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            docroot: "./www".to_string(),
            threads: 4,
            keep_alive: true,
            no_keep_alive: false,
            timeout_secs: 5,
            http2: true,
            no_http2: false,
            ws_path: "/ws".to_string(),
        }
    }
}
