//! Named in-process profiles.
//!
//! Three profiles are always registered: `goroutine` (live threads and their
//! stacks), `heap` (allocation counters and process memory) and
//! `threadcreate` (where threads were created). Applications may register
//! their own [`StackProfile`]s with [`new_profile`].

mod error;
pub mod heap;
mod live_threads;
mod profile;
mod stack;
pub mod thread;

pub use error::ProfileError;
pub use heap::{heap_stats, HeapProfile, HeapStats, TrackingAllocator};
pub use live_threads::{live_threads, ThreadInfo, ThreadProfile};
pub use profile::{Profile, Record, StackProfile};
pub use stack::{Stack, Symbol};

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;

pub const GOROUTINE: &str = "goroutine";
pub const HEAP: &str = "heap";
pub const THREADCREATE: &str = "threadcreate";

/// Header and record counts only.
pub const DEBUG_COUNTS: u8 = 0;
/// Records with raw stacks.
pub const DEBUG_STACKS: u8 = 1;
/// Records with fully symbolized stacks and frame counts.
pub const DEBUG_SYMBOLIZED: u8 = 2;

static PROFILES: Lazy<RwLock<BTreeMap<String, Arc<dyn Profile>>>> = Lazy::new(|| {
    let mut profiles: BTreeMap<String, Arc<dyn Profile>> = BTreeMap::new();
    profiles.insert(GOROUTINE.to_string(), Arc::new(ThreadProfile));
    profiles.insert(HEAP.to_string(), Arc::new(HeapProfile));
    profiles.insert(
        THREADCREATE.to_string(),
        thread::THREADCREATE_PROFILE.clone(),
    );
    RwLock::new(profiles)
});

/// Looks up a registered profile by name.
pub fn lookup(name: &str) -> Option<Arc<dyn Profile>> {
    PROFILES
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(name)
        .cloned()
}

/// Names of all registered profiles, sorted.
pub fn profiles() -> Vec<String> {
    PROFILES
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .keys()
        .cloned()
        .collect()
}

/// Registers a new, empty [`StackProfile`] under `name`.
pub fn new_profile(name: &str) -> Result<Arc<StackProfile>, ProfileError> {
    if name.trim().is_empty() {
        return Err(ProfileError::InvalidName(name.to_string()));
    }
    let mut profiles = PROFILES.write().unwrap_or_else(PoisonError::into_inner);
    if profiles.contains_key(name) {
        return Err(ProfileError::AlreadyExists(name.to_string()));
    }
    let profile = Arc::new(StackProfile::new(name));
    profiles.insert(name.to_string(), profile.clone());
    log::debug!("registered profile {}", name);
    Ok(profile)
}
