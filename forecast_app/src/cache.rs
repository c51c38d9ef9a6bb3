//! Table cache keyed by file path
//!
//! Entries are reused while the file's modification time and size are
//! unchanged and reloaded otherwise.

use crate::Result;
use demand_forecast::DataLoader;
use polars::prelude::DataFrame;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Stamp {
    modified: Option<SystemTime>,
    len: u64,
}

impl Stamp {
    fn of(path: &Path) -> Result<Self> {
        let meta = fs::metadata(path)?;
        Ok(Self {
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }
}

#[derive(Debug)]
struct Entry {
    stamp: Stamp,
    frame: Arc<DataFrame>,
}

/// CSV tables loaded once and shared until their file changes
#[derive(Debug, Default)]
pub struct TableCache {
    entries: HashMap<PathBuf, Entry>,
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached table for `path`, loading it on a miss or when the file changed
    pub fn get_or_load<P: AsRef<Path>>(&mut self, path: P) -> Result<Arc<DataFrame>> {
        let path = path.as_ref();
        let stamp = Stamp::of(path)?;

        if let Some(entry) = self.entries.get(path) {
            if entry.stamp == stamp {
                debug!(path = %path.display(), "table cache hit");
                return Ok(Arc::clone(&entry.frame));
            }
            debug!(path = %path.display(), "table changed on disk, reloading");
        }

        let frame = Arc::new(DataLoader::from_csv(path)?);
        debug!(path = %path.display(), rows = frame.height(), "loaded table");
        self.entries.insert(
            path.to_path_buf(),
            Entry {
                stamp,
                frame: Arc::clone(&frame),
            },
        );
        Ok(frame)
    }

    /// Drop the entry for `path`; returns whether one existed
    pub fn invalidate<P: AsRef<Path>>(&mut self, path: P) -> bool {
        self.entries.remove(path.as_ref()).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
