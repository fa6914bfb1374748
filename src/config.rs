use std::env;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;

use strum::VariantNames;
use tracing::warn;

use crate::owner::Owner;
use crate::owner::set_enabled;

/// Environment variable holding the subsystem toggle list, e.g.
/// `ZONEMARK_SUBSYSTEMS=+INFERENCE,-GC,+METHOD_MATCH`. Names match
/// [`Owner`] display names, case-sensitively.
pub const ENV_VAR_SUBSYSTEMS: &str = "ZONEMARK_SUBSYSTEMS";

/// Environment variable overriding the metadata print limit.
pub const ENV_VAR_METADATA_PRINT_LIMIT: &str = "ZONEMARK_METADATA_PRINT_LIMIT";

/// Default number of metadata items a call site may attach to one zone.
pub const DEFAULT_PRINT_LIMIT: u32 = 10;

static PRINT_LIMIT: AtomicU32 = AtomicU32::new(DEFAULT_PRINT_LIMIT);

/// How many metadata items a call site may attach to one zone before
/// truncating. See [`ZoneGuard::annotate_items`][crate::ZoneGuard::annotate_items].
pub fn print_limit() -> u32 {
    PRINT_LIMIT.load(Ordering::Relaxed)
}

/// Override the print limit. Intended for startup configuration.
pub fn set_print_limit(limit: u32) {
    PRINT_LIMIT.store(limit, Ordering::Relaxed);
}

/// Read both environment inputs and apply them. Call once at startup.
///
/// Bad instrumentation config never aborts startup: unknown subsystem names
/// and malformed values are logged and skipped.
pub fn apply_env() {
    if let Ok(list) = env::var(ENV_VAR_SUBSYSTEMS) {
        apply_toggle_list(&list);
    }
    if let Ok(raw) = env::var(ENV_VAR_METADATA_PRINT_LIMIT) {
        apply_print_limit(&raw);
    }
}

fn apply_toggle_list(list: &str) {
    for token in list.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let Some((enabled, name)) = split_signed(token) else {
            warn!("ignoring subsystem toggle without a leading + or -: `{token}`");
            continue;
        };
        if set_enabled(name, enabled).is_err() {
            warn!("unknown subsystem `{name}`; valid names: {}", Owner::VARIANTS.join(", "));
        }
    }
}

fn split_signed(token: &str) -> Option<(bool, &str)> {
    if let Some(name) = token.strip_prefix('+') {
        return Some((true, name));
    }
    token.strip_prefix('-').map(|name| (false, name))
}

fn apply_print_limit(raw: &str) {
    match raw.trim().parse() {
        Ok(limit) => set_print_limit(limit),
        Err(_) => warn!("ignoring malformed metadata print limit `{raw}`"),
    }
}

#[cfg(test)]
mod tests {
    use assert2::assert;

    use crate::owner::is_enabled;
    use crate::owner::set_owner_enabled;

    use super::*;

    #[test]
    fn toggle_list_applies_signed_names_and_nothing_else() {
        assert!(let Ok(()) = set_enabled("GC", true));
        assert!(is_enabled(Owner::Gc));

        set_owner_enabled(Owner::Inference, false);
        set_owner_enabled(Owner::MethodMatch, false);
        set_owner_enabled(Owner::LoadModule, true);

        apply_toggle_list("+INFERENCE,-GC,+METHOD_MATCH");

        assert!(is_enabled(Owner::Inference));
        assert!(!is_enabled(Owner::Gc));
        assert!(is_enabled(Owner::MethodMatch));
        assert!(is_enabled(Owner::LoadModule));

        set_owner_enabled(Owner::Gc, true);
    }

    #[test]
    fn malformed_and_unknown_tokens_are_skipped() {
        apply_toggle_list("INFERENCE, +NOT_A_SUBSYSTEM ,,+, -");
    }

    #[test]
    fn signs_are_split_from_names() {
        assert!(Some((true, "GC")) == split_signed("+GC"));
        assert!(Some((false, "GC")) == split_signed("-GC"));
        assert!(split_signed("GC").is_none());
    }

    #[test]
    fn print_limit_parses_or_keeps_the_previous_value() {
        apply_print_limit("20");
        assert!(20 == print_limit());
        apply_print_limit("abc");
        assert!(20 == print_limit());
        apply_print_limit("-3");
        assert!(20 == print_limit());
        apply_print_limit(" 15 ");
        assert!(15 == print_limit());
        set_print_limit(DEFAULT_PRINT_LIMIT);
    }
}
