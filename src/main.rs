//! # Entry Point
//! src/main.rs
//!
//! Punto de entrada del servidor multi-protocolo.
//!
//! Soporta configuración via CLI arguments y variables de entorno.
//! Sale con código 0 tras un apagado limpio y 1 si la inicialización
//! falla.

use redunix_server::config::Config;
use redunix_server::server::Server;

fn main() {
    println!("=================================");
    println!("  RedUnix Multi-Protocol Server");
    println!("  Principios de Sistemas Operativos");
    println!("=================================\n");

    // Parsear configuración desde CLI/env
    let config = Config::new();

    // Validar configuración
    if let Err(e) = config.validate() {
        eprintln!("❌ Error de configuración: {}", e);
        eprintln!("\nUsa --help para ver las opciones disponibles");
        std::process::exit(1);
    }

    // Imprimir resumen de configuración
    config.print_summary();

    // Crear el servidor
    let mut server = Server::new(config);

    // Iniciar el servidor (esto bloqueará el thread hasta el apagado)
    if let Err(e) = server.run() {
        eprintln!("💥 Error fatal: {}", e);
        std::process::exit(1);
    }
}
