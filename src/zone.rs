use std::borrow::Cow;
use std::fmt;
use std::fmt::Write;
use std::marker::PhantomData;

use crate::config;
use crate::owner::Owner;

#[cfg(feature = "counts")]
use crate::counts::CountsBackend;
#[cfg(feature = "tracy")]
use crate::trace::TraceBackend;

/// Longest annotation forwarded to a backend, in bytes. Longer text is
/// clipped at a character boundary and terminated with `…`.
pub const ANNOTATION_BUDGET: usize = 80;

/// Source position captured where a zone is opened, handed to the trace
/// backend as the zone's location.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct CodeLocation {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

impl CodeLocation {
    pub const fn new(file: &'static str, line: u32, column: u32) -> Self {
        Self { file, line, column }
    }
}

impl fmt::Display for CodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// One measurement strategy.
///
/// The build configuration decides which strategies are active (see
/// [`ActiveBackend`]); every strategy gets the same begin/end/annotate
/// surface and attaches its own state to each zone. `()` is the strategy
/// that measures nothing, and a pair of strategies is itself a strategy.
pub(crate) trait TimingBackend {
    /// Per-zone state this strategy carries inside the guard.
    type ZoneState;

    fn zone_begin(owner: Owner, event: &'static str, location: CodeLocation) -> Self::ZoneState;
    fn zone_end(state: Self::ZoneState);
    fn zone_text(state: &Self::ZoneState, text: &str);

    /// Whether `zone_text` currently reaches any consumer. Lets the guard
    /// skip formatting annotations nobody will see.
    fn wants_text(state: &Self::ZoneState) -> bool;
}

impl TimingBackend for () {
    type ZoneState = ();

    fn zone_begin(_owner: Owner, _event: &'static str, _location: CodeLocation) {}

    fn zone_end(_state: ()) {}

    fn zone_text(_state: &(), _text: &str) {}

    fn wants_text(_state: &()) -> bool {
        false
    }
}

impl<A: TimingBackend, B: TimingBackend> TimingBackend for (A, B) {
    type ZoneState = (A::ZoneState, B::ZoneState);

    fn zone_begin(owner: Owner, event: &'static str, location: CodeLocation) -> Self::ZoneState {
        (
            A::zone_begin(owner, event, location),
            B::zone_begin(owner, event, location),
        )
    }

    fn zone_end(state: Self::ZoneState) {
        let (a, b) = state;
        A::zone_end(a);
        B::zone_end(b);
    }

    fn zone_text(state: &Self::ZoneState, text: &str) {
        A::zone_text(&state.0, text);
        B::zone_text(&state.1, text);
    }

    fn wants_text(state: &Self::ZoneState) -> bool {
        A::wants_text(&state.0) || B::wants_text(&state.1)
    }
}

/// The strategy composition selected by the enabled cargo features.
///
/// Counts fold before the trace region closes, so a span never outlives the
/// accounting of the zone it mirrors.
#[cfg(all(feature = "counts", feature = "tracy"))]
pub(crate) type ActiveBackend = (CountsBackend, TraceBackend);
#[cfg(all(feature = "counts", not(feature = "tracy")))]
pub(crate) type ActiveBackend = CountsBackend;
#[cfg(all(not(feature = "counts"), feature = "tracy"))]
pub(crate) type ActiveBackend = TraceBackend;
#[cfg(not(any(feature = "counts", feature = "tracy")))]
pub(crate) type ActiveBackend = ();

type ActiveState = <ActiveBackend as TimingBackend>::ZoneState;

/// Scoped handle to an open timing zone.
///
/// Dropping the guard ends the zone: its exclusive time folds into the
/// counters and the trace region (if any) closes. The drop runs on every
/// exit path of the scope, including early `return` and unwinding, so a
/// zone can never be left dangling by the code it measures.
///
/// Guards are tied to the execution context that opened them and are
/// neither `Send` nor `Sync`; a scheduler that migrates whole tasks between
/// carrier threads moves their zones with
/// [`TaskZoneStack`](crate::TaskZoneStack).
#[must_use = "dropping the guard is what ends the zone"]
pub struct ZoneGuard {
    state: Option<ActiveState>,
    _not_send_sync: PhantomData<*const ()>,
}

impl ZoneGuard {
    /// Open a zone for `owner`, tagged with a caller-supplied event name.
    ///
    /// Call sites normally use [`zone!`](crate::zone!), which fills in the
    /// source location.
    pub fn enter_at(owner: Owner, event: &'static str, location: CodeLocation) -> Self {
        let state = ActiveBackend::zone_begin(owner, event, location);
        Self {
            state: Some(state),
            _not_send_sync: PhantomData,
        }
    }

    /// Attach a short piece of text to the zone.
    pub fn annotate(&self, text: &str) {
        let Some(state) = &self.state else { return };
        if ActiveBackend::wants_text(state) {
            ActiveBackend::zone_text(state, &clipped(text));
        }
    }

    /// Annotate with anything displayable: a runtime value through its
    /// `Display` impl, a path through [`Path::display`], a formatted message
    /// through [`format_args!`]. Nothing is formatted unless a trace region
    /// is actually listening.
    ///
    /// [`Path::display`]: std::path::Path::display
    pub fn annotate_display(&self, value: impl fmt::Display) {
        let Some(state) = &self.state else { return };
        if !ActiveBackend::wants_text(state) {
            return;
        }
        ActiveBackend::zone_text(state, &clipped_to_string(&value));
    }

    /// Annotate with a sequence of items, at most
    /// [`print_limit`](crate::print_limit) of them; the rest collapse into a
    /// single `+N more` annotation.
    pub fn annotate_items<I>(&self, items: I)
    where
        I: IntoIterator,
        I::Item: fmt::Display,
    {
        let Some(state) = &self.state else { return };
        if !ActiveBackend::wants_text(state) {
            return;
        }
        let limit = config::print_limit() as usize;
        let mut surplus = 0_usize;
        for (position, item) in items.into_iter().enumerate() {
            if position < limit {
                ActiveBackend::zone_text(state, &clipped_to_string(&item));
            } else {
                surplus += 1;
            }
        }
        if surplus > 0 {
            ActiveBackend::zone_text(state, &format!("+{surplus} more"));
        }
    }
}

impl Drop for ZoneGuard {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            ActiveBackend::zone_end(state);
        }
    }
}

impl fmt::Debug for ZoneGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZoneGuard").finish_non_exhaustive()
    }
}

fn clipped(text: &str) -> Cow<'_, str> {
    if text.len() <= ANNOTATION_BUDGET {
        return Cow::Borrowed(text);
    }
    let mut end = ANNOTATION_BUDGET;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let mut short = String::with_capacity(end + '…'.len_utf8());
    short.push_str(&text[..end]);
    short.push('…');
    Cow::Owned(short)
}

fn clipped_to_string(value: &impl fmt::Display) -> String {
    let mut writer = ClippedWriter::default();
    let _ = write!(writer, "{value}");
    writer.into_text()
}

/// A `fmt::Write` sink that stops consuming once the annotation budget is
/// reached, so arbitrarily large `Display` impls cost at most one small
/// buffer.
#[derive(Debug, Default)]
struct ClippedWriter {
    buf: String,
    clipped: bool,
}

impl ClippedWriter {
    fn into_text(mut self) -> String {
        if self.clipped {
            self.buf.push('…');
        }
        self.buf
    }
}

impl fmt::Write for ClippedWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.clipped {
            return Ok(());
        }
        let room = ANNOTATION_BUDGET - self.buf.len();
        if s.len() <= room {
            self.buf.push_str(s);
        } else {
            let mut end = room;
            while !s.is_char_boundary(end) {
                end -= 1;
            }
            self.buf.push_str(&s[..end]);
            self.clipped = true;
        }
        Ok(())
    }
}

/// Open a timing zone in the current scope.
///
/// Expands to a [`ZoneGuard`] construction that captures the call site's
/// source location for the trace backend. Bind the guard to a local to keep
/// the zone open for the whole scope:
///
/// ```
/// fn load_module() {
///     let zone = zonemark::zone!(LoadModule, "load_module");
///     zone.annotate("core.lang");
///     // the zone closes when `zone` drops, on every exit path
/// }
/// # load_module();
/// ```
#[macro_export]
macro_rules! zone {
    ($owner:ident, $event:expr) => {
        $crate::ZoneGuard::enter_at(
            $crate::Owner::$owner,
            $event,
            $crate::CodeLocation::new(file!(), line!(), column!()),
        )
    };
}
