use std::alloc::{GlobalAlloc, Layout};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use procfs::process::Process;

use crate::profile::Profile;
use crate::HEAP;

static ALLOC_BYTES: AtomicU64 = AtomicU64::new(0);
static ALLOC_OBJECTS: AtomicU64 = AtomicU64::new(0);
static FREE_BYTES: AtomicU64 = AtomicU64::new(0);
static FREE_OBJECTS: AtomicU64 = AtomicU64::new(0);
static TRACKING: AtomicBool = AtomicBool::new(false);

/// Global allocator wrapper that keeps the counters behind the `heap`
/// profile.
///
/// ```ignore
/// use probing_pprof::heap::TrackingAllocator;
///
/// #[global_allocator]
/// static GLOBAL: TrackingAllocator<std::alloc::System> =
///     TrackingAllocator::new(std::alloc::System);
/// ```
pub struct TrackingAllocator<A> {
    inner: A,
}

impl<A> TrackingAllocator<A> {
    pub const fn new(inner: A) -> Self {
        Self { inner }
    }
}

#[inline]
fn record_alloc(size: usize) {
    TRACKING.store(true, Ordering::Relaxed);
    ALLOC_BYTES.fetch_add(size as u64, Ordering::Relaxed);
    ALLOC_OBJECTS.fetch_add(1, Ordering::Relaxed);
}

#[inline]
fn record_free(size: usize) {
    FREE_BYTES.fetch_add(size as u64, Ordering::Relaxed);
    FREE_OBJECTS.fetch_add(1, Ordering::Relaxed);
}

unsafe impl<A: GlobalAlloc> GlobalAlloc for TrackingAllocator<A> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = self.inner.alloc(layout);
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = self.inner.alloc_zeroed(layout);
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        self.inner.dealloc(ptr, layout);
        record_free(layout.size());
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = self.inner.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            record_free(layout.size());
            record_alloc(new_size);
        }
        new_ptr
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    pub alloc_bytes: u64,
    pub alloc_objects: u64,
    pub free_bytes: u64,
    pub free_objects: u64,
}

impl HeapStats {
    pub fn in_use_bytes(&self) -> u64 {
        self.alloc_bytes.saturating_sub(self.free_bytes)
    }

    pub fn in_use_objects(&self) -> u64 {
        self.alloc_objects.saturating_sub(self.free_objects)
    }
}

/// Counters of the [`TrackingAllocator`], or `None` when it is not the
/// global allocator of this process.
pub fn heap_stats() -> Option<HeapStats> {
    if !TRACKING.load(Ordering::Relaxed) {
        return None;
    }
    Some(HeapStats {
        alloc_bytes: ALLOC_BYTES.load(Ordering::Relaxed),
        alloc_objects: ALLOC_OBJECTS.load(Ordering::Relaxed),
        free_bytes: FREE_BYTES.load(Ordering::Relaxed),
        free_objects: FREE_OBJECTS.load(Ordering::Relaxed),
    })
}

/// Allocation counters plus the memory figures the kernel reports for the
/// process.
#[derive(Debug, Default)]
pub struct HeapProfile;

impl HeapProfile {
    fn write_process_memory(w: &mut dyn Write, debug: u8) -> io::Result<()> {
        let me = Process::myself().map_err(io::Error::other)?;
        let status = me.status().map_err(io::Error::other)?;
        let kb = |v: Option<u64>| {
            v.map(|v| v.to_string())
                .unwrap_or_else(|| "n/a".to_string())
        };
        writeln!(w, "\n# process memory (kB)")?;
        writeln!(w, "# VmSize = {}", kb(status.vmsize))?;
        writeln!(w, "# VmRSS = {}", kb(status.vmrss))?;
        writeln!(w, "# VmHWM = {}", kb(status.vmhwm))?;
        writeln!(w, "# VmData = {}", kb(status.vmdata))?;
        writeln!(w, "# Threads = {}", status.threads)?;
        if debug > 0 {
            let statm = me.statm().map_err(io::Error::other)?;
            writeln!(w, "\n# statm (pages)")?;
            writeln!(w, "# size = {}", statm.size)?;
            writeln!(w, "# resident = {}", statm.resident)?;
            writeln!(w, "# shared = {}", statm.shared)?;
            writeln!(w, "# text = {}", statm.text)?;
            writeln!(w, "# data = {}", statm.data)?;
        }
        Ok(())
    }
}

impl Profile for HeapProfile {
    fn name(&self) -> &str {
        HEAP
    }

    fn count(&self) -> usize {
        heap_stats().map(|s| s.in_use_objects() as usize).unwrap_or(0)
    }

    fn write_to(&self, w: &mut dyn Write, debug: u8) -> io::Result<()> {
        match heap_stats() {
            Some(stats) => {
                writeln!(
                    w,
                    "heap profile: {}: {} [{}: {}]",
                    stats.in_use_objects(),
                    stats.in_use_bytes(),
                    stats.alloc_objects,
                    stats.alloc_bytes
                )?;
                if debug > 0 {
                    writeln!(w, "\n# allocator")?;
                    writeln!(w, "# InUseBytes = {}", stats.in_use_bytes())?;
                    writeln!(w, "# InUseObjects = {}", stats.in_use_objects())?;
                    writeln!(w, "# TotalAllocBytes = {}", stats.alloc_bytes)?;
                    writeln!(w, "# Mallocs = {}", stats.alloc_objects)?;
                    writeln!(w, "# Frees = {}", stats.free_objects)?;
                }
            }
            None => {
                writeln!(w, "heap profile: allocation tracking not installed")?;
            }
        }
        Self::write_process_memory(w, debug)
    }
}
