// Global `tracing` subscriber setup. The teacher's `Tracing.cs`/
// `TraceManager.cs` per-component trace-source pattern has no counterpart
// here: `track_sdk::trace::TracingTraceWriter` already routes every
// `RunnerContext.trace` call through the `tracing` crate directly, so a
// second named-source abstraction over the same crate would just be a
// parallel, unused path.

/// Initialize the global `tracing` subscriber. Call once from `main`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}
