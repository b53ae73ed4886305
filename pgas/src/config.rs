//! Runtime-configurable tuning parameters for the runtime.
//!
//! All values have sensible defaults. Override via environment variables
//! (prefixed `PGAS_`) or by constructing a custom `PgasConfig`.

/// Tuning parameters for message handling and transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgasConfig {
    /// Number of worker threads executing message handlers.
    pub worker_threads: usize,

    /// Maximum number of collective handlers running at once per node.
    /// Barrier and group traffic is not counted.
    pub max_concurrent_handlers: usize,

    /// Frames larger than this are rejected by the decoder.
    pub max_frame_bytes: usize,
}

impl Default for PgasConfig {
    fn default() -> Self {
        Self {
            worker_threads: 4,
            max_concurrent_handlers: 512,
            max_frame_bytes: 64 * 1024 * 1024, // 64 MiB
        }
    }
}

impl PgasConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Recognized variables:
    /// - `PGAS_WORKER_THREADS`
    /// - `PGAS_MAX_CONCURRENT_HANDLERS`
    /// - `PGAS_MAX_FRAME_BYTES`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(n) = parse_positive(lookup("PGAS_WORKER_THREADS")) {
            cfg.worker_threads = n;
        }
        if let Some(n) = parse_positive(lookup("PGAS_MAX_CONCURRENT_HANDLERS")) {
            cfg.max_concurrent_handlers = n;
        }
        if let Some(n) = parse_positive(lookup("PGAS_MAX_FRAME_BYTES")) {
            cfg.max_frame_bytes = n;
        }

        cfg
    }
}

fn parse_positive(value: Option<String>) -> Option<usize> {
    value
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
}
