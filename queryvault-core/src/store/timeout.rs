//! Server-side execution budget
//!
//! The caller-side timeout already bounds total call latency, including
//! task scheduling and row decoding. The engine's own execution ceiling is
//! derived from it at 80%, so the engine gives up before the caller would
//! have, leaving headroom for everything around the engine call.

use std::time::Duration;

/// Derive the engine-side execution ceiling from a caller timeout:
/// `ceil(timeout * 0.8)` at nanosecond granularity.
///
/// A zero timeout means "no deadline" and yields a zero ceiling, which
/// callers must propagate as absence of a bound, never apply as a
/// near-zero one. Monotonic: a larger timeout never yields a smaller
/// ceiling.
pub fn execution_ceiling(timeout: Duration) -> Duration {
    let nanos = timeout.as_nanos() as f64;
    Duration::from_nanos((nanos * 0.8).ceil() as u64)
}
