//! Timing zones for language-runtime internals.
//!
//! A runtime that compiles, infers, collects garbage, and loads modules wants
//! to know where its own time goes. This crate lets each such subsystem wrap
//! its work in a *zone*: a scoped measurement tied to one [`Owner`] out of a
//! fixed, crate-defined set. Zones nest; time spent in a nested zone counts
//! toward the nested zone's owner only, so per-owner totals are self time and
//! add up across owners.
//!
//! Instrumentation is meant to stay compiled into release builds. Opening a
//! zone is a couple of thread-local operations and two clock reads; nothing
//! blocks, nothing allocates on the hot path, and nothing is written to disk.
//!
//! # Examples
//!
//! Open a zone around the work to be measured and let the guard close it:
//!
//! ```
//! zonemark::init();
//!
//! {
//!     let zone = zonemark::zone!(Inference, "infer call site");
//!     zone.annotate("f(::Int64, ::String)");
//!     // ... the measured work ...
//! }
//!
//! zonemark::set_enabled("GC", false).unwrap();
//! assert!(!zonemark::is_enabled(zonemark::Owner::Gc));
//! ```
//!
//! # Measurement backends
//!
//! What happens inside a zone is decided at compile time by cargo features,
//! each of which contributes one measurement strategy:
//!
//! - `counts` (default): per-owner accumulators of exclusive zone time,
//!   summarized on demand by [`CountsReport`](crate::report::CountsReport).
//! - `tracy`: every zone additionally becomes a span in the [Tracy] visual
//!   profiler, with the call site's source location and any annotations
//!   attached. Fiber suspension points can be bridged with
//!   [`suspend_fiber`].
//!
//! With both features enabled, both strategies observe every zone. With
//! neither, zones compile down to nothing.
//!
//! The runtime enable mask ([`set_enabled`], [`is_enabled`]) gates the trace
//! forwarding per owner. The accumulators ignore the mask: they are cheap
//! enough to always run, and a total that silently excluded some disabled
//! window would be worse than no total.
//!
//! # Configuration
//!
//! [`apply_env`] reads two process environment variables at startup:
//! `ZONEMARK_SUBSYSTEMS`, a comma-separated list of signed owner names such
//! as `+INFERENCE,-GC,+METHOD_MATCH`, and `ZONEMARK_METADATA_PRINT_LIMIT`,
//! the per-zone annotation item cap. Malformed entries are logged through
//! [`tracing`] and skipped.
//!
//! [Tracy]: https://github.com/wolfpld/tracy

pub use crate::config::apply_env;
pub use crate::config::print_limit;
pub use crate::config::set_print_limit;
#[cfg(feature = "counts")]
pub use crate::counts::TaskZoneStack;
#[cfg(feature = "counts")]
pub use crate::counts::accumulated;
#[cfg(feature = "counts")]
pub use crate::counts::zone_depth;
pub use crate::error::UnknownSubsystemError;
pub use crate::owner::ENABLE_MASK_ALL;
pub use crate::owner::Owner;
pub use crate::owner::is_enabled;
pub use crate::owner::set_enabled;
pub use crate::owner::set_owner_enabled;
#[cfg(feature = "counts")]
pub use crate::report::CountsReport;
pub use crate::suspend::SuspendGuard;
pub use crate::suspend::enter_fiber;
pub use crate::suspend::leave_fiber;
pub use crate::suspend::suspend_fiber;
pub use crate::zone::ANNOTATION_BUDGET;
pub use crate::zone::CodeLocation;
pub use crate::zone::ZoneGuard;

pub mod config;
#[cfg(feature = "counts")]
mod counts;
pub mod error;
pub mod owner;
#[cfg(feature = "counts")]
pub mod report;
pub mod suspend;
#[cfg(feature = "tracy")]
mod trace;
pub mod zone;

/// Bring the subsystem up. Idempotent; call once, early in process startup.
///
/// Marks the epoch that untracked time in a [`CountsReport`] is measured
/// against and, when the `tracy` feature is compiled in, starts the trace
/// client. Zones opened before `init` still count; they just cannot be
/// distinguished from untracked startup time in the summary.
pub fn init() {
    #[cfg(feature = "counts")]
    counts::mark_epoch();
    #[cfg(feature = "tracy")]
    trace::start_client();
}

/// Release the trace client, if one is running.
///
/// Accumulated counters survive shutdown and stay readable; only the
/// connection to the profiler is given up.
pub fn shutdown() {
    #[cfg(feature = "tracy")]
    trace::stop_client();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_calls_are_idempotent() {
        init();
        init();
        shutdown();
        shutdown();
        init();
    }

    #[test]
    fn a_zone_survives_repeated_initialization() {
        init();
        let zone = zone!(MethodLookupFast, "lookup");
        init();
        drop(zone);
    }
}
