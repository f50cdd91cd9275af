/// Settings for tracing output
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Default log level when RUST_LOG is unset (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit structured JSON lines instead of the human-readable format
    pub json_output: bool,
}
