use std::io::{self, Write};

use nix::unistd::gettid;
use procfs::process::Process;

use crate::profile::Profile;
use crate::stack::Stack;
use crate::thread::creation_stack;
use crate::GOROUTINE;

#[derive(Debug, Clone)]
pub struct ThreadInfo {
    pub tid: i32,
    pub name: String,
    pub state: char,
}

/// Live threads of the process, read from `/proc/self/task`.
pub fn live_threads() -> io::Result<Vec<ThreadInfo>> {
    let me = Process::myself().map_err(io::Error::other)?;
    let mut threads = Vec::new();
    for task in me.tasks().map_err(io::Error::other)? {
        let Ok(task) = task else {
            // exited while listing
            continue;
        };
        match task.stat() {
            Ok(stat) => threads.push(ThreadInfo {
                tid: task.tid,
                name: stat.comm,
                state: stat.state,
            }),
            Err(err) => log::debug!("skipping thread {}: {}", task.tid, err),
        }
    }
    threads.sort_by_key(|t| t.tid);
    Ok(threads)
}

/// Snapshot of every OS thread in the process, taken when written.
///
/// The writing thread contributes its own symbolized stack. Other threads
/// are listed with their scheduler state and, when they were started through
/// [`crate::thread`], the stack that created them.
#[derive(Debug, Default)]
pub struct ThreadProfile;

impl Profile for ThreadProfile {
    fn name(&self) -> &str {
        GOROUTINE
    }

    fn count(&self) -> usize {
        live_threads().map(|t| t.len()).unwrap_or(0)
    }

    #[inline(never)]
    fn write_to(&self, w: &mut dyn Write, debug: u8) -> io::Result<()> {
        let current_stack = Stack::capture(0);
        let current = gettid().as_raw();
        let threads = live_threads()?;

        writeln!(w, "{} profile: total {}", GOROUTINE, threads.len())?;
        for thread in &threads {
            let marker = if thread.tid == current { " (dumping)" } else { "" };
            if debug == 0 {
                writeln!(w, "{} [{}] {}{}", thread.tid, thread.name, thread.state, marker)?;
                continue;
            }
            writeln!(
                w,
                "\nthread {} [{}] state={}{}",
                thread.tid, thread.name, thread.state, marker
            )?;
            if thread.tid == current {
                current_stack.write_to(w, debug)?;
            }
            if let Some(stack) = creation_stack(thread.tid) {
                writeln!(w, "created by:")?;
                stack.write_to(w, debug)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEBUG_SYMBOLIZED;

    #[test]
    fn test_live_threads_contains_current() {
        let current = gettid().as_raw();
        let threads = live_threads().unwrap();
        assert!(threads.iter().any(|t| t.tid == current));
    }

    #[test]
    fn test_write_marks_dumping_thread() {
        let current = gettid().as_raw();
        let mut out = Vec::new();
        ThreadProfile.write_to(&mut out, DEBUG_SYMBOLIZED).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("goroutine profile: total "));
        assert!(text.contains(&format!("\nthread {} [", current)));
        assert!(text.contains("(dumping)"));
        assert!(text.contains("frame #0"));
    }

    #[test]
    fn test_write_counts_only() {
        let mut out = Vec::new();
        ThreadProfile.write_to(&mut out, 0).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("frame #"));
        assert!(text.lines().count() >= 2);
    }
}
