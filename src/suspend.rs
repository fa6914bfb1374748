//! Fiber relabeling for the trace backend.
//!
//! When a cooperative scheduler switches what a carrier thread is running,
//! the zones themselves stay where they are; only the trace tool's notion of
//! "which fiber is this thread executing" changes. The bridge tracks the
//! current label per thread so nested suspensions restore in order.

use std::cell::RefCell;
#[cfg(feature = "tracy")]
use std::collections::HashSet;
#[cfg(feature = "tracy")]
use std::ffi::CString;
#[cfg(feature = "tracy")]
use std::ffi::c_char;
use std::marker::PhantomData;
#[cfg(feature = "tracy")]
use std::sync::Mutex;
#[cfg(feature = "tracy")]
use std::sync::OnceLock;

#[cfg(feature = "tracy")]
use tracy_client::Client;
#[cfg(feature = "tracy")]
use tracy_client::sys;

thread_local! {
    static FIBER_LABEL: RefCell<Option<String>> = const { RefCell::new(None) };
}

#[cfg(feature = "tracy")]
static FIBER_NAMES: OnceLock<Mutex<HashSet<CString>>> = OnceLock::new();

/// Tracy keeps fiber-name pointers for the life of the program, so every
/// label is interned once and never freed. Labels with interior NUL bytes
/// cannot cross the FFI boundary and yield `None`.
#[cfg(feature = "tracy")]
fn interned_fiber_name(label: &str) -> Option<*const c_char> {
    let owned = CString::new(label).ok()?;
    let table = FIBER_NAMES.get_or_init(|| Mutex::new(HashSet::new()));
    let Ok(mut names) = table.lock() else {
        return None;
    };
    let ptr = match names.get(&owned) {
        Some(existing) => existing.as_ptr(),
        None => {
            let ptr = owned.as_ptr();
            names.insert(owned);
            ptr
        }
    };
    Some(ptr)
}

// The safe client has no fiber surface; announcements go through the
// `fibers` FFI of the bundled sys crate.
#[cfg(feature = "tracy")]
fn announce(label: &str) {
    let Some(_live) = Client::running() else {
        return;
    };
    let Some(name) = interned_fiber_name(label) else {
        return;
    };
    // SAFETY: `name` stays valid for the rest of the process and `_live`
    // keeps the profiler alive across the call.
    unsafe { sys::___tracy_fiber_enter(name) };
}

#[cfg(feature = "tracy")]
fn announce_leave() {
    let Some(_live) = Client::running() else {
        return;
    };
    // SAFETY: `_live` keeps the profiler alive across the call.
    unsafe { sys::___tracy_fiber_leave() };
}

/// Announce that this thread is now running the task/fiber called `name`.
pub fn enter_fiber(name: &str) {
    FIBER_LABEL.with_borrow_mut(|current| *current = Some(name.to_string()));
    #[cfg(feature = "tracy")]
    announce(name);
}

/// Announce that this thread is back to plain, non-fiber execution.
pub fn leave_fiber() {
    FIBER_LABEL.with_borrow_mut(|current| *current = None);
    #[cfg(feature = "tracy")]
    announce_leave();
}

/// Relabels the trace view while something else borrows this thread.
///
/// Dropping the guard restores the label that was current when
/// [`suspend_fiber`] was called. Zone accounting is never affected.
#[must_use = "dropping the guard is what restores the previous fiber label"]
#[derive(Debug)]
pub struct SuspendGuard {
    previous: Option<String>,
    _not_send_sync: PhantomData<*const ()>,
}

/// Mark, for the external tool only, that the current fiber gives way to
/// `label` (a scheduler, an I/O poller) until the returned guard drops.
pub fn suspend_fiber(label: &str) -> SuspendGuard {
    let previous = FIBER_LABEL.with_borrow_mut(|current| current.replace(label.to_string()));
    #[cfg(feature = "tracy")]
    announce(label);
    SuspendGuard {
        previous,
        _not_send_sync: PhantomData,
    }
}

impl Drop for SuspendGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        #[cfg(feature = "tracy")]
        match &previous {
            Some(label) => announce(label),
            None => announce_leave(),
        }
        FIBER_LABEL.with_borrow_mut(|current| *current = previous);
    }
}

#[cfg(test)]
pub(crate) fn current_fiber_label() -> Option<String> {
    FIBER_LABEL.with_borrow(Clone::clone)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suspensions_restore_previous_labels_in_order() {
        enter_fiber("task alpha");
        assert_eq!(Some("task alpha".to_string()), current_fiber_label());
        {
            let _outer = suspend_fiber("scheduler");
            assert_eq!(Some("scheduler".to_string()), current_fiber_label());
            {
                let _inner = suspend_fiber("io poller");
                assert_eq!(Some("io poller".to_string()), current_fiber_label());
            }
            assert_eq!(Some("scheduler".to_string()), current_fiber_label());
        }
        assert_eq!(Some("task alpha".to_string()), current_fiber_label());
        leave_fiber();
        assert_eq!(None, current_fiber_label());
    }

    #[test]
    fn suspending_with_no_prior_fiber_leaves_fiber_mode_on_drop() {
        let guard = suspend_fiber("scheduler");
        assert_eq!(Some("scheduler".to_string()), current_fiber_label());
        drop(guard);
        assert_eq!(None, current_fiber_label());
    }

    #[cfg(feature = "counts")]
    #[test]
    fn suspension_never_touches_zone_accounting() {
        let counted_before = crate::accumulated(crate::Owner::InitModule);
        let _zone = crate::zone!(InitModule, "init");
        let depth_before = crate::zone_depth();
        {
            let _suspended = suspend_fiber("scheduler");
            assert_eq!(depth_before, crate::zone_depth());
            assert_eq!(counted_before, crate::accumulated(crate::Owner::InitModule));
        }
        assert_eq!(depth_before, crate::zone_depth());
        assert_eq!(counted_before, crate::accumulated(crate::Owner::InitModule));
    }

    #[cfg(feature = "tracy")]
    #[test]
    fn fiber_labels_intern_to_stable_pointers() {
        let first = interned_fiber_name("worker pool").unwrap();
        let again = interned_fiber_name("worker pool").unwrap();
        assert_eq!(first, again);

        let other = interned_fiber_name("io acceptor").unwrap();
        assert_ne!(first, other);
    }

    #[cfg(feature = "tracy")]
    #[test]
    fn labels_with_interior_nul_bytes_are_never_announced() {
        assert!(interned_fiber_name("sched\0uler").is_none());
    }
}
