//! # Collector de Métricas
//! src/metrics/collector.rs
//!
//! Recolecta métricas del servidor en dos historiales FIFO acotados:
//! requests individuales (capacidad 1000) y snapshots del sistema
//! (capacidad 300). Al escribir se recorta por la cabeza, así los
//! historiales siempre contienen lo más reciente.
//!
//! Los exports son documentos JSON con discriminador `type` en el nivel
//! superior (`metrics`, `request_rate`, `system_metrics`) y el payload
//! en `data`; son los mismos documentos que consume el dashboard por
//! WebSocket.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::shutdown::ShutdownCoordinator;

/// Máximo de requests en el historial
const MAX_REQUEST_HISTORY: usize = 1000;

/// Máximo de snapshots del sistema en el historial
const MAX_SYSTEM_HISTORY: usize = 300;

/// Registro de un request atendido
#[derive(Debug, Clone)]
pub struct RequestMetric {
    /// Momento del registro (para calcular edades)
    pub recorded_at: Instant,
    pub method: String,
    pub path: String,
    pub status_code: u16,
    pub duration_ms: f64,
}

/// Snapshot periódico del estado del sistema
#[derive(Debug, Clone, Serialize)]
pub struct SystemMetric {
    /// Epoch en milisegundos
    pub timestamp: i64,
    pub memory_mb: u64,
    pub cpu_percent: f64,
    pub active_connections: usize,
    pub total_requests: u64,
    pub requests_per_second: f64,
    pub queue_size: usize,
    pub thread_count: usize,
}

/// Envelope de los exports: `{"type": ..., "data": ...}`
#[derive(Serialize)]
struct Export<T: Serialize> {
    #[serde(rename = "type")]
    kind: &'static str,
    data: T,
}

#[derive(Serialize)]
struct CountersData {
    total_requests: u64,
    requests_per_minute: u64,
    timestamp: i64,
}

#[derive(Serialize)]
struct RateBucket {
    timestamp: i64,
    count: u64,
}

/// Datos internos protegidos por el mutex de métricas
///
/// Este mutex es el último de la jerarquía de locks: nunca se toma otro
/// recurso compartido mientras se sostiene.
struct MetricsData {
    request_history: VecDeque<RequestMetric>,
    system_history: VecDeque<SystemMetric>,

    /// Contador rodante que se reinicia en fronteras de minuto
    requests_last_minute: u64,
    last_minute_reset: Instant,

    /// Estado para la estimación de CPU por tasa de requests
    cpu_last_sample: Instant,
    cpu_last_requests: u64,
}

/// Collector de métricas thread-safe
pub struct MetricsCollector {
    inner: Mutex<MetricsData>,
    total_requests: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            inner: Mutex::new(MetricsData {
                request_history: VecDeque::with_capacity(MAX_REQUEST_HISTORY),
                system_history: VecDeque::with_capacity(MAX_SYSTEM_HISTORY),
                requests_last_minute: 0,
                last_minute_reset: now,
                cpu_last_sample: now,
                cpu_last_requests: 0,
            }),
            total_requests: AtomicU64::new(0),
        }
    }

    /// Registra un request atendido
    pub fn record_request(&self, method: &str, path: &str, status_code: u16, duration_ms: f64) {
        let mut data = self.inner.lock().unwrap();

        data.request_history.push_back(RequestMetric {
            recorded_at: Instant::now(),
            method: method.to_string(),
            path: path.to_string(),
            status_code,
            duration_ms,
        });

        while data.request_history.len() > MAX_REQUEST_HISTORY {
            data.request_history.pop_front();
        }

        self.total_requests.fetch_add(1, Ordering::SeqCst);
        data.requests_last_minute += 1;
        Self::roll_minute_counter(&mut data);
    }

    /// Registra un snapshot del sistema
    pub fn record_system_metrics(
        &self,
        active_connections: usize,
        queue_size: usize,
        thread_count: usize,
    ) {
        let mut data = self.inner.lock().unwrap();
        Self::roll_minute_counter(&mut data);

        let total = self.total_requests.load(Ordering::SeqCst);
        let cpu_percent = Self::estimate_cpu(&mut data, total);

        let metric = SystemMetric {
            timestamp: epoch_millis(),
            memory_mb: read_memory_usage_mb(),
            cpu_percent,
            active_connections,
            total_requests: total,
            requests_per_second: data.requests_last_minute as f64 / 60.0,
            queue_size,
            thread_count,
        };

        data.system_history.push_back(metric);
        while data.system_history.len() > MAX_SYSTEM_HISTORY {
            data.system_history.pop_front();
        }
    }

    /// Reinicia el contador por minuto cuando cruza la frontera
    fn roll_minute_counter(data: &mut MetricsData) {
        if data.last_minute_reset.elapsed() >= Duration::from_secs(60) {
            data.requests_last_minute = 0;
            data.last_minute_reset = Instant::now();
        }
    }

    /// Estimación simple de CPU por tasa de requests
    ///
    /// Aproximación heredada del servidor original: no mide al kernel,
    /// escala la tasa de requests y la acota a 100.
    fn estimate_cpu(data: &mut MetricsData, total: u64) -> f64 {
        let elapsed = data.cpu_last_sample.elapsed().as_secs_f64();
        if elapsed < 1.0 {
            return 0.0;
        }

        let delta = total.saturating_sub(data.cpu_last_requests) as f64;
        data.cpu_last_requests = total;
        data.cpu_last_sample = Instant::now();

        (delta / elapsed * 0.5).min(100.0)
    }

    /// Total de requests atendidos desde el arranque
    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::SeqCst)
    }

    /// Cantidad de requests en el historial (para tests y stats)
    pub fn request_history_len(&self) -> usize {
        self.inner.lock().unwrap().request_history.len()
    }

    /// Export `{"type":"metrics", ...}` con los contadores globales
    pub fn metrics_json(&self) -> String {
        let data = self.inner.lock().unwrap();
        let export = Export {
            kind: "metrics",
            data: CountersData {
                total_requests: self.total_requests.load(Ordering::SeqCst),
                requests_per_minute: data.requests_last_minute,
                timestamp: epoch_millis(),
            },
        };
        serde_json::to_string(&export).unwrap_or_else(|_| String::from("{}"))
    }

    /// Export `{"type":"request_rate", ...}` con 60 buckets de un segundo
    ///
    /// El bucket más viejo va primero; cada bucket cuenta los requests
    /// cuya edad cae en ese segundo.
    pub fn request_rate_json(&self) -> String {
        let data = self.inner.lock().unwrap();
        let now = Instant::now();
        let now_millis = epoch_millis();

        let mut counts = [0u64; 60];
        for metric in &data.request_history {
            let age = now.duration_since(metric.recorded_at).as_secs();
            if age < 60 {
                counts[age as usize] += 1;
            }
        }

        let buckets: Vec<RateBucket> = (0..60)
            .rev()
            .map(|age| RateBucket {
                timestamp: now_millis - (age as i64) * 1000,
                count: counts[age],
            })
            .collect();

        let export = Export {
            kind: "request_rate",
            data: buckets,
        };
        serde_json::to_string(&export).unwrap_or_else(|_| String::from("{}"))
    }

    /// Export `{"type":"system_metrics", ...}` con el historial completo
    pub fn system_metrics_json(&self) -> String {
        let data = self.inner.lock().unwrap();
        let history: Vec<&SystemMetric> = data.system_history.iter().collect();

        let export = Export {
            kind: "system_metrics",
            data: history,
        };
        serde_json::to_string(&export).unwrap_or_else(|_| String::from("{}"))
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Epoch actual en milisegundos
fn epoch_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Memoria residente del proceso en MB, leída de /proc/self/status
fn read_memory_usage_mb() -> u64 {
    let status = match std::fs::read_to_string("/proc/self/status") {
        Ok(content) => content,
        Err(_) => return 0,
    };

    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            let kb: u64 = rest
                .trim()
                .split_whitespace()
                .next()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            return kb / 1024;
        }
    }

    0
}

/// Loop del sampler de métricas del sistema
///
/// Toma un snapshot por segundo; `sample_sources` entrega la tupla
/// (conexiones activas, tareas encoladas, threads del pool).
pub fn sampler_loop<F>(
    metrics: Arc<MetricsCollector>,
    coordinator: Arc<ShutdownCoordinator>,
    sample_sources: F,
) where
    F: Fn() -> (usize, usize, usize),
{
    while !coordinator.is_shutdown_requested() {
        if coordinator.wait_for_shutdown(Duration::from_secs(1)) {
            break;
        }

        let (active_connections, queue_size, thread_count) = sample_sources();
        metrics.record_system_metrics(active_connections, queue_size, thread_count);
    }

    coordinator.thread_exiting();
}
