use std::collections::{BTreeMap, HashMap};
use std::io::{self, Write};
use std::sync::{PoisonError, RwLock};

use crate::stack::Stack;
use crate::DEBUG_STACKS;

/// A named in-process profile that can be serialized on demand.
pub trait Profile: Send + Sync {
    fn name(&self) -> &str;

    /// Number of records the profile currently holds.
    fn count(&self) -> usize;

    /// Serializes a snapshot of the profile.
    ///
    /// `debug` selects the detail level: 0 writes the header and record
    /// counts, 1 adds raw stacks, 2 writes every record with fully
    /// symbolized stacks.
    fn write_to(&self, w: &mut dyn Write, debug: u8) -> io::Result<()>;
}

#[derive(Clone, Debug)]
pub struct Record {
    pub label: String,
    pub stack: Stack,
}

/// A profile made of records that callers add and remove explicitly, each
/// remembering the stack that added it.
#[derive(Debug)]
pub struct StackProfile {
    name: String,
    records: RwLock<BTreeMap<u64, Record>>,
}

impl StackProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: RwLock::new(BTreeMap::new()),
        }
    }

    /// Adds a record under `key` with the current stack, skipping `skip`
    /// frames above the caller. Returns false if `key` is already present.
    #[inline(never)]
    pub fn add(&self, key: u64, label: impl Into<String>, skip: usize) -> bool {
        let stack = Stack::capture(skip + 1);
        self.add_with_stack(key, label, stack)
    }

    pub fn add_with_stack(&self, key: u64, label: impl Into<String>, stack: Stack) -> bool {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        if records.contains_key(&key) {
            log::debug!("profile {}: duplicate record {}", self.name, key);
            return false;
        }
        records.insert(
            key,
            Record {
                label: label.into(),
                stack,
            },
        );
        true
    }

    pub fn relabel(&self, key: u64, label: impl Into<String>) -> bool {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        match records.get_mut(&key) {
            Some(record) => {
                record.label = label.into();
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, key: u64) -> Option<Record> {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key)
    }

    pub fn get(&self, key: u64) -> Option<Record> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    fn snapshot(&self) -> Vec<(u64, Record)> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, r)| (*k, r.clone()))
            .collect()
    }
}

impl Profile for StackProfile {
    fn name(&self) -> &str {
        &self.name
    }

    fn count(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn write_to(&self, w: &mut dyn Write, debug: u8) -> io::Result<()> {
        let records = self.snapshot();
        writeln!(w, "{} profile: total {}", self.name, records.len())?;
        match debug {
            0 => {
                for (key, record) in &records {
                    writeln!(w, "{}: {} [{} frames]", key, record.label, record.stack.len())?;
                }
            }
            DEBUG_STACKS => {
                // identical stacks collapse into one entry, most frequent first
                let mut groups: HashMap<&Stack, usize> = HashMap::new();
                for (_, record) in &records {
                    *groups.entry(&record.stack).or_default() += 1;
                }
                let mut groups: Vec<_> = groups.into_iter().collect();
                groups.sort_by(|a, b| {
                    b.1.cmp(&a.1)
                        .then_with(|| a.0.addresses().cmp(b.0.addresses()))
                });
                for (stack, count) in groups {
                    let addrs: Vec<String> =
                        stack.addresses().iter().map(|ip| format!("{:#x}", ip)).collect();
                    writeln!(w, "\n{} @ {}", count, addrs.join(" "))?;
                    stack.write_to(w, debug)?;
                }
            }
            _ => {
                for (key, record) in &records {
                    writeln!(w, "\n{}: {}", key, record.label)?;
                    record.stack.write_to(w, debug)?;
                }
            }
        }
        Ok(())
    }
}
