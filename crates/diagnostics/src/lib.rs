//! Simple diagnostics library for the bqdeploy project
//!
//! Provides lightweight, configurable logging across all crates in the project.
//!
//! Usage:
//! - Set BQDEPLOY_LOG=off (default) - no logs
//! - Set BQDEPLOY_LOG=info - basic operation logs
//! - Set BQDEPLOY_LOG=debug - detailed diagnostic logs

use std::sync::Once;

// Re-export emit so macros can use it
pub use emit;

static INIT: Once = Once::new();

/// Initialize diagnostics based on BQDEPLOY_LOG environment variable
///
/// This should be called once at application startup. It's safe to call
/// multiple times - subsequent calls will be ignored.
pub fn init_diagnostics() {
    INIT.call_once(|| {
        let log_level = std::env::var("BQDEPLOY_LOG").unwrap_or_else(|_| "off".to_string());

        let rt = match log_level.as_str() {
            "off" => return, // No setup needed
            "debug" => emit::setup()
                .emit_to(emit_term::stderr())
                .emit_when(emit::level::min_filter(emit::Level::Debug))
                .init(),
            "info" => emit::setup()
                .emit_to(emit_term::stderr())
                .emit_when(emit::level::min_filter(emit::Level::Info))
                .init(),
            "warn" => emit::setup()
                .emit_to(emit_term::stderr())
                .emit_when(emit::level::min_filter(emit::Level::Warn))
                .init(),
            "error" => emit::setup()
                .emit_to(emit_term::stderr())
                .emit_when(emit::level::min_filter(emit::Level::Error))
                .init(),
            _ => {
                let rt = emit::setup()
                    .emit_to(emit_term::stderr())
                    .emit_when(emit::level::min_filter(emit::Level::Info))
                    .init();
                // Bootstrap warning - this will show even with unknown level
                eprintln!(
                    "Warning: Unknown BQDEPLOY_LOG value '{}', using 'info'",
                    log_level
                );
                rt
            }
        };

        // The emit runtime must live for the rest of the process
        std::mem::forget(rt);
    });
}

/// Log basic operations (dataset creation, view deployment, etc.)
///
/// Use this for operations that users might want to see in normal usage.
/// Examples: "Dataset created", "View updated", "Deployment complete"
///
/// Re-exported directly from `emit`: wrapping these proc macros in
/// `macro_rules!` forwarders breaks the hygiene of identifiers captured
/// from the template string (e.g. `info!("Dataset {name} created")`).
pub use emit::info;

/// Log detailed diagnostics (file paths, rendered queries, request URLs, etc.)
///
/// Use this for detailed information useful for debugging.
/// Examples: "Reading SQL file", "POST https://..."
pub use emit::debug;

/// Log warning conditions (skipped files, continue-on-error failures)
///
/// Use this for issues that don't prevent operation but should be noted.
/// Examples: "Skipping non-SQL file", "View failed, continuing"
pub use emit::warn;

/// Log critical error conditions (failures, unrecoverable errors)
///
/// Use this for serious problems that prevent normal operation.
/// Examples: "Authentication failed", "Cannot read views directory"
pub use emit::error;

/// Re-export the init function for convenience
pub use init_diagnostics as init;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_safe_to_call_multiple_times() {
        // Should not panic when called multiple times
        init_diagnostics();
        init_diagnostics();
        init_diagnostics();
    }

    #[test]
    fn test_macros_compile() {
        info!("Test message");
        debug!("Debug message with {value}", value: 42);
        warn!("Warning message");
        error!("Error message");
    }
}
