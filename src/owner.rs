use std::str::FromStr;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use arbitrary::Arbitrary;
use strum::Display;
use strum::EnumCount;
use strum::EnumIter;
use strum::EnumString;
use strum::VariantNames;

use crate::error::UnknownSubsystemError;

/// The runtime subsystems eligible to own timing zones.
///
/// An `Owner` is the fixed vocabulary every other part of the layer speaks:
/// its discriminant is the owner's row in the counters table and its bit
/// position in the enable mask, and its display name (screaming snake case,
/// e.g. `METHOD_LOOKUP_SLOW`) is what [`set_enabled`] and the environment
/// toggle list match against.
#[repr(usize)]
#[derive(
    Debug,
    Display,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Hash,
    EnumCount,
    EnumIter,
    EnumString,
    VariantNames,
    Arbitrary,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Owner {
    /// Top-level runtime activity not claimed by any other subsystem. The
    /// counters summary attributes untracked remainder time to this owner.
    Root,
    /// Garbage collection, including the stop-the-world phases.
    Gc,
    Parsing,
    Lowering,
    /// Type inference over method instances.
    Inference,
    Codegen,
    /// Optimization passes run by the JIT backend on emitted code.
    JitOpt,
    MethodLookupSlow,
    MethodLookupFast,
    MethodMatch,
    TypeCacheLookup,
    TypeCacheInsert,
    StagedFunction,
    MacroInvocation,
    AstCompress,
    AstUncompress,
    /// Loading a precompiled runtime image.
    ImageLoad,
    ImageSave,
    AddMethod,
    LoadModule,
    SaveModule,
    InitModule,
}

// The enable mask is a single word.
const _: () = assert!(Owner::COUNT <= 64);

/// Every subsystem's trace-forwarding bit set. This is the enable mask's
/// default state; curate it with [`set_enabled`] or the environment toggle
/// list rather than by recompiling.
pub const ENABLE_MASK_ALL: u64 = u64::MAX >> (64 - Owner::COUNT);

static ENABLE_MASK: AtomicU64 = AtomicU64::new(ENABLE_MASK_ALL);

impl Owner {
    /// This owner's row in the counters table and bit position in the enable
    /// mask.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The display name matched by [`set_enabled`] and printed in reports.
    pub fn name(self) -> &'static str {
        Self::VARIANTS[self.index()]
    }

    const fn mask_bit(self) -> u64 {
        1 << self.index()
    }
}

impl From<Owner> for usize {
    fn from(owner: Owner) -> Self {
        owner.index()
    }
}

/// Is trace forwarding enabled for `owner`?
///
/// A pure bit test. The trace backend evaluates it once per zone, at
/// creation; the counts backend never consults it.
pub fn is_enabled(owner: Owner) -> bool {
    ENABLE_MASK.load(Ordering::Relaxed) & owner.mask_bit() != 0
}

/// Flip a single owner's trace-forwarding bit.
pub fn set_owner_enabled(owner: Owner, enabled: bool) {
    if enabled {
        ENABLE_MASK.fetch_or(owner.mask_bit(), Ordering::Relaxed);
    } else {
        ENABLE_MASK.fetch_and(!owner.mask_bit(), Ordering::Relaxed);
    }
}

/// Flip the bit of the subsystem whose display name is `name`.
///
/// Matching is exact and case-sensitive. On failure the mask is unchanged.
pub fn set_enabled(name: &str, enabled: bool) -> Result<(), UnknownSubsystemError> {
    let owner =
        Owner::from_str(name).map_err(|_| UnknownSubsystemError(name.to_string()))?;
    set_owner_enabled(owner, enabled);
    Ok(())
}
