//! Thread spawning that records where each thread was created.
//!
//! Threads started through [`spawn`] or [`Builder`] show up in the
//! `threadcreate` profile with the stack of the code that created them, and
//! the `goroutine` profile uses the same record to tell where a live thread
//! came from.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use nix::unistd::gettid;
use once_cell::sync::Lazy;

use crate::profile::StackProfile;
use crate::stack::Stack;
use crate::THREADCREATE;

pub(crate) static THREADCREATE_PROFILE: Lazy<Arc<StackProfile>> =
    Lazy::new(|| Arc::new(StackProfile::new(THREADCREATE)));

static NEXT_THREAD_KEY: AtomicU64 = AtomicU64::new(1);

// live tid -> threadcreate record key
static LIVE_THREADS: Lazy<Mutex<HashMap<i32, u64>>> = Lazy::new(Default::default);

/// Spawns a thread like [`std::thread::spawn`] and records its creation.
#[inline(never)]
pub fn spawn<F, T>(f: F) -> JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let stack = Stack::capture(1);
    spawn_recorded(std::thread::Builder::new(), None, stack, f)
        .unwrap_or_else(|err| panic!("failed to spawn thread: {err}"))
}

/// Counterpart of [`std::thread::Builder`] that records thread creation.
#[derive(Debug, Default)]
pub struct Builder {
    name: Option<String>,
    stack_size: Option<usize>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    #[inline(never)]
    pub fn spawn<F, T>(self, f: F) -> io::Result<JoinHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let stack = Stack::capture(1);
        let mut builder = std::thread::Builder::new();
        if let Some(name) = &self.name {
            builder = builder.name(name.clone());
        }
        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }
        spawn_recorded(builder, self.name, stack, f)
    }
}

fn spawn_recorded<F, T>(
    builder: std::thread::Builder,
    name: Option<String>,
    stack: Stack,
    f: F,
) -> io::Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let key = NEXT_THREAD_KEY.fetch_add(1, Ordering::Relaxed);
    let name = name.unwrap_or_else(|| "<unnamed>".to_string());
    THREADCREATE_PROFILE.add_with_stack(key, format!("thread '{}'", name), stack);

    let thread_name = name.clone();
    let handle = builder.spawn(move || {
        let tid = gettid().as_raw();
        THREADCREATE_PROFILE.relabel(key, format!("thread '{}' (tid {})", thread_name, tid));
        let _live = LiveGuard::register(tid, key);
        f()
    });
    if let Err(err) = &handle {
        log::warn!("thread creation failed: {}", err);
        THREADCREATE_PROFILE.relabel(key, format!("thread '{}' (spawn failed)", name));
    }
    handle
}

struct LiveGuard {
    tid: i32,
}

impl LiveGuard {
    fn register(tid: i32, key: u64) -> Self {
        LIVE_THREADS
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tid, key);
        Self { tid }
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        LIVE_THREADS
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.tid);
    }
}

/// Stack that created the live thread `tid`, if it was spawned through this
/// module.
pub fn creation_stack(tid: i32) -> Option<Stack> {
    let key = *LIVE_THREADS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&tid)?;
    THREADCREATE_PROFILE.get(key).map(|r| r.stack)
}
