//! The forwarding strategy: mirrors every enabled zone as a span in the
//! [Tracy](https://github.com/wolfpld/tracy) profiler.
//!
//! The enable-mask gate is evaluated once, when the zone opens; flipping a
//! bit mid-zone affects only later zones. Without a running client every
//! operation degrades to a no-op.

use std::sync::Mutex;

use tracy_client::Client;
use tracy_client::Span;

use crate::owner::Owner;
use crate::owner::is_enabled;
use crate::zone::CodeLocation;
use crate::zone::TimingBackend;

// Zones carry their own source location; callstack sampling stays off.
const CALLSTACK_DEPTH: u16 = 0;

static CLIENT: Mutex<Option<Client>> = Mutex::new(None);

/// Start the client and hold on to the handle so the connection outlives
/// short-lived zones. Idempotent.
pub(crate) fn start_client() {
    let Ok(mut held) = CLIENT.lock() else { return };
    if held.is_none() {
        *held = Some(Client::start());
    }
}

pub(crate) fn stop_client() {
    let Ok(mut held) = CLIENT.lock() else { return };
    *held = None;
}

#[derive(Debug)]
pub(crate) struct TraceBackend;

impl TimingBackend for TraceBackend {
    type ZoneState = Option<Span>;

    fn zone_begin(owner: Owner, event: &'static str, location: CodeLocation) -> Option<Span> {
        if !is_enabled(owner) {
            return None;
        }
        let client = Client::running()?;
        Some(client.span_alloc(
            Some(event),
            owner.name(),
            location.file,
            location.line,
            CALLSTACK_DEPTH,
        ))
    }

    fn zone_end(state: Option<Span>) {
        drop(state);
    }

    fn zone_text(state: &Option<Span>, text: &str) {
        if let Some(span) = state {
            span.emit_text(text);
        }
    }

    fn wants_text(state: &Option<Span>) -> bool {
        state.is_some()
    }
}

#[cfg(test)]
mod tests {
    use crate::owner::set_owner_enabled;

    use super::*;

    #[test]
    fn disabled_owner_never_opens_a_span() {
        set_owner_enabled(Owner::JitOpt, false);
        let location = CodeLocation::new(file!(), line!(), column!());
        let state = TraceBackend::zone_begin(Owner::JitOpt, "opt", location);
        assert!(state.is_none());
        set_owner_enabled(Owner::JitOpt, true);
    }

    #[test]
    fn operations_on_an_unopened_span_are_no_ops() {
        let state = None;
        assert!(!TraceBackend::wants_text(&state));
        TraceBackend::zone_text(&state, "ignored");
        TraceBackend::zone_end(state);
    }
}
