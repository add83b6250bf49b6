//! Tunable constants, centralized in one module rather than scattered as
//! inline magic numbers. There is no config file to parse here; an embedder
//! that wants these configurable can still do so by forking this module.
use std::time::Duration;

/// Initial backoff between `get_snapshot` retries while waiting for
/// `resolved_ts` to advance.
pub const SNAPSHOT_RETRY_INITIAL_BACKOFF: Duration = Duration::from_millis(10);

/// Upper bound on the backoff between `get_snapshot` retries.
pub const SNAPSHOT_RETRY_MAX_BACKOFF: Duration = Duration::from_secs(5);

/// A single `get_snapshot` call that has been retrying for at least this
/// long logs a warning, once, the first time it crosses the threshold.
pub const SNAPSHOT_RETRY_WARN_THRESHOLD: Duration = Duration::from_secs(30);

/// Advisory upper bound, in the same units as [`crate::ids::Timestamp`], on
/// how far behind `resolved_ts` a GC driver should let `gc_ts` lag before
/// calling `Storage::do_gc`. `History` does not enforce this itself —
/// retention is driven explicitly by `do_gc` — this constant exists for a GC
/// task to compute the `ts` it passes in
/// (`resolved_ts - MAX_RETAINED_SNAPSHOT_WINDOW`).
pub const MAX_RETAINED_SNAPSHOT_WINDOW: u64 = 5 * 60 * 1000;
