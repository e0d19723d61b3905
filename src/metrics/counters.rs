use std::sync::Arc;
use std::sync::atomic::AtomicU64;

/// Minimal counters for operational visibility.
#[derive(Clone, Default)]
pub struct Counters {
    pub ticks: Arc<AtomicU64>,
    pub samples_ingested: Arc<AtomicU64>,
    pub fetch_failures: Arc<AtomicU64>,

    // alerts fired, by rule
    pub alerts_absolute: Arc<AtomicU64>,
    pub alerts_flip: Arc<AtomicU64>,
    pub alerts_spread: Arc<AtomicU64>,
}
