//! Background library index
//!
//! The indexer owns one worker thread that receives batches of library
//! entries over a channel and files them by qualified name for prefix lookup.
//! The engine suspends it for the duration of every `eval` and `drop`; the
//! worker finishes the entry it is filing and then waits until every
//! [`SuspendGuard`] has been dropped.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, trace};

/// One indexed library member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Fully qualified name, e.g. `lib.math.max`
    pub qualified_name: String,
    /// Human-readable signature
    pub detail: String,
}

impl IndexEntry {
    /// Last segment of the qualified name
    pub fn simple_name(&self) -> &str {
        self.qualified_name
            .rsplit('.')
            .next()
            .unwrap_or(&self.qualified_name)
    }
}

enum Command {
    Index(Vec<IndexEntry>),
    Flush(Sender<()>),
    Shutdown,
}

#[derive(Default)]
struct SuspendState {
    count: Mutex<usize>,
    resumed: Condvar,
}

impl SuspendState {
    fn wait_resumed(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.resumed.wait(&mut count);
        }
    }
}

/// Keeps the indexer suspended until dropped
#[must_use = "the indexer resumes as soon as the guard is dropped"]
pub struct SuspendGuard {
    state: Arc<SuspendState>,
}

impl Drop for SuspendGuard {
    fn drop(&mut self) {
        let mut count = self.state.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.state.resumed.notify_all();
        }
    }
}

/// Library index built on a background thread
pub struct LibraryIndexer {
    sender: Sender<Command>,
    index: Arc<RwLock<BTreeMap<String, IndexEntry>>>,
    suspend: Arc<SuspendState>,
    worker: Option<thread::JoinHandle<()>>,
}

impl LibraryIndexer {
    /// Start the worker thread
    pub fn start() -> std::io::Result<Self> {
        let (sender, receiver) = channel::unbounded();
        let index = Arc::new(RwLock::new(BTreeMap::new()));
        let suspend = Arc::new(SuspendState::default());

        let worker = {
            let index = Arc::clone(&index);
            let suspend = Arc::clone(&suspend);
            thread::Builder::new()
                .name("library-indexer".to_string())
                .spawn(move || Self::run(receiver, index, suspend))?
        };

        Ok(Self {
            sender,
            index,
            suspend,
            worker: Some(worker),
        })
    }

    fn run(
        receiver: Receiver<Command>,
        index: Arc<RwLock<BTreeMap<String, IndexEntry>>>,
        suspend: Arc<SuspendState>,
    ) {
        for command in receiver.iter() {
            match command {
                Command::Index(entries) => {
                    debug!(entries = entries.len(), "indexing library");
                    for entry in entries {
                        suspend.wait_resumed();
                        trace!(name = %entry.qualified_name, "indexed");
                        index.write().insert(entry.qualified_name.clone(), entry);
                    }
                }
                Command::Flush(reply) => {
                    let _ = reply.send(());
                }
                Command::Shutdown => break,
            }
        }
    }

    /// Queue entries for indexing
    pub fn submit(
        &self,
        entries: Vec<IndexEntry>,
    ) {
        if self.sender.send(Command::Index(entries)).is_err() {
            debug!("library indexer is gone, entries dropped");
        }
    }

    /// Block until everything submitted so far is indexed
    ///
    /// Waits forever if called while a [`SuspendGuard`] is alive on the same
    /// thread.
    pub fn flush(&self) {
        let (reply, done) = channel::bounded(1);
        if self.sender.send(Command::Flush(reply)).is_ok() {
            let _ = done.recv();
        }
    }

    /// Pause indexing until the guard is dropped
    pub fn suspend(&self) -> SuspendGuard {
        *self.suspend.count.lock() += 1;
        SuspendGuard {
            state: Arc::clone(&self.suspend),
        }
    }

    /// Check if some guard is alive
    pub fn is_suspended(&self) -> bool {
        *self.suspend.count.lock() > 0
    }

    /// Entries whose qualified or simple name starts with `prefix`
    pub fn lookup(
        &self,
        prefix: &str,
    ) -> Vec<IndexEntry> {
        self.index
            .read()
            .values()
            .filter(|entry| entry.qualified_name.starts_with(prefix) || entry.simple_name().starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Number of indexed entries
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    /// Check if nothing is indexed yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for LibraryIndexer {
    fn drop(&mut self) {
        let _ = self.sender.send(Command::Shutdown);
        *self.suspend.count.lock() = 0;
        self.suspend.resumed.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl std::fmt::Debug for LibraryIndexer {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("LibraryIndexer")
            .field("entries", &self.len())
            .field("suspended", &self.is_suspended())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn entry(name: &str) -> IndexEntry {
        IndexEntry {
            qualified_name: name.to_string(),
            detail: format!("{}()", name),
        }
    }

    #[test]
    fn test_lookup_by_prefix() {
        let indexer = LibraryIndexer::start().unwrap();
        indexer.submit(vec![entry("lib.math.max"), entry("lib.math.min"), entry("lib.text.upper")]);
        indexer.flush();

        assert_eq!(indexer.len(), 3);
        assert_eq!(indexer.lookup("lib.math").len(), 2);
        assert_eq!(indexer.lookup("up")[0].qualified_name, "lib.text.upper");
        assert!(indexer.lookup("zzz").is_empty());
    }

    #[test]
    fn test_suspended_indexer_waits() {
        let indexer = LibraryIndexer::start().unwrap();
        let guard = indexer.suspend();
        assert!(indexer.is_suspended());
        indexer.submit(vec![entry("lib.math.abs")]);
        thread::sleep(Duration::from_millis(50));
        assert!(indexer.is_empty());

        drop(guard);
        indexer.flush();
        assert_eq!(indexer.len(), 1);
        assert!(!indexer.is_suspended());
    }

    #[test]
    fn test_nested_guards() {
        let indexer = LibraryIndexer::start().unwrap();
        let outer = indexer.suspend();
        let inner = indexer.suspend();
        drop(inner);
        assert!(indexer.is_suspended());
        drop(outer);
        assert!(!indexer.is_suspended());
    }
}
