//! # Observability & Tracing
//!
//! The engine logs through the `tracing` crate with structured fields, so a transition
//! can be followed from its span down to each probe:
//!
//! ```text
//! INFO transition{entity=default/aa:bb:cc:dd:ee:ff operation=adopt}: Transient failure, retrying attempts=1 delay=1s
//! INFO transition{entity=default/aa:bb:cc:dd:ee:ff operation=adopt}:poll: Converged probes=4 state=Connected
//! INFO transition{entity=default/aa:bb:cc:dd:ee:ff operation=adopt}: Transition complete state=Connected
//! ```
//!
//! | Level | What you see |
//! |-------|--------------|
//! | `info` | transition outcomes, convergence |
//! | `warn` | retries, timeouts, unexpected states |
//! | `debug` | every observation and mutating attempt |
//! | `trace` | raw probe results |
//!
//! Verbosity is controlled with `RUST_LOG`, e.g. `RUST_LOG=reconcile_engine=debug`.

/// Install a compact `fmt` subscriber filtered by `RUST_LOG`.
///
/// Call once at process start. Library code never calls this.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
