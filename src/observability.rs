//! This module provides observability and diagnostics capabilities for the
//! tile executor.
//!
//! A lazy, tiled evaluator needs visibility into what it actually computed.
//! This module provides structured logging hooks to make the executor's
//! behavior transparent and debuggable. The `log_metric!` macro is the
//! primary tool.
//!
//! It is a zero-cost abstraction: the `#[cfg(debug_assertions)]` attribute
//! ensures that the macro and all calls to it are completely compiled out
//! of release builds.

/// Logs a structured key-value metric string to stdout, only in debug builds.
///
/// # Example
/// ```
/// use raster_tools::log_metric;
/// let tiles = 4;
/// log_metric!("event" = "eval_done", "tiles" = &tiles);
/// ```
#[macro_export]
macro_rules! log_metric {
    ($($key:literal = $value:expr),+ $(,)?) => {
        #[cfg(debug_assertions)]
        {
            let mut parts = Vec::new();
            $(
                parts.push(format!("\"{}\": \"{}\"", $key, $value));
            )+

            let output = format!("RASTER_METRIC: {{ {} }}", parts.join(", "));
            println!("{}", output);
        }
    };
}

/// Initializes `env_logger` with a default filter, for binaries and tests
/// that want the library's `log` output. Safe to call more than once.
pub fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .is_test(false)
        .try_init();
}
