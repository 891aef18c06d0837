use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use types::Pid;

/// The off-RAM page repository.
///
/// Pages are zero-filled on first reference and written back on dirty
/// eviction. The store mirrors itself to a human-readable text file, one
/// line per page; the file is truncated when the store is created, so
/// nothing persists across runs.
#[derive(Debug)]
pub struct BackingStore {
    path: PathBuf,
    pages: BTreeMap<(Pid, u32), Vec<u16>>,
}

impl BackingStore {
    pub const DEFAULT_PATH: &'static str = "csopesy-backing-store.txt";

    /// Open the store, truncating any on-disk image left by a previous run.
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        fs::write(&path, "")?;
        Ok(Self {
            path,
            pages: BTreeMap::new(),
        })
    }

    /// The stored image for `(pid, page)`. A first reference records and
    /// returns a zero image of `frame_size` words.
    pub fn load(&mut self, pid: Pid, page: u32, frame_size: usize) -> &[u16] {
        self.pages
            .entry((pid, page))
            .or_insert_with(|| vec![0; frame_size])
    }

    /// Record a page image, replacing any previous contents.
    pub fn store(&mut self, pid: Pid, page: u32, image: Vec<u16>) {
        self.pages.insert((pid, page), image);
    }

    /// Rewrite the on-disk image of the whole store. Called after every
    /// write-back.
    pub fn flush(&self) -> io::Result<()> {
        let mut out = String::new();
        for ((pid, page), words) in &self.pages {
            out.push_str(&format!("Page: {}:{} Data:", pid, page));
            for word in words {
                out.push(' ');
                out.push_str(&word.to_string());
            }
            out.push('\n');
        }
        fs::write(&self.path, out)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}
