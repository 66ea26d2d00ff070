//! # Sistema de Métricas
//! src/metrics/mod.rs
//!
//! Este módulo implementa la recolección de métricas del servidor:
//! - Historial acotado de requests (últimos 1000)
//! - Historial acotado de snapshots del sistema (últimos 300)
//! - Contadores globales y tasa por minuto
//! - Exports JSON para el dashboard y el canal WebSocket

pub mod collector;

pub use collector::{sampler_loop, MetricsCollector, RequestMetric, SystemMetric};
