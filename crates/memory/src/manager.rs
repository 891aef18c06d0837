use std::fmt;
use std::sync::Arc;

use log::{debug, error};
use types::{Clock, Pid};

use crate::backing::BackingStore;
use crate::paging::{FrameTableEntry, PageDirectory};

/// A single word of memory traffic routed through the paging layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    /// The pid has no entry in the page directory.
    NoSuchProcess(Pid),
    /// Address at or beyond the process's allocation. Fatal to the process.
    SegmentationFault { pid: Pid, addr: usize },
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::NoSuchProcess(pid) => write!(f, "no such process: pid {pid}"),
            MemoryError::SegmentationFault { pid, addr } => {
                write!(f, "segmentation fault: pid {pid} addr {addr}")
            }
        }
    }
}

impl std::error::Error for MemoryError {}

/// Paging activity counters. Both only ever increase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VmStats {
    pub pages_paged_in: u64,
    pub pages_paged_out: u64,
}

/// The demand-paging core: physical RAM, the global frame table, fault
/// handling, and LRU eviction into the backing store.
///
/// Physical RAM is a flat array of 16-bit word slots, one slot per simulated
/// byte address; a page occupies a contiguous frame-sized slice. Page tables
/// live with their processes and are reached through [`PageDirectory`], so
/// the manager holds no lock of its own — callers serialize it behind the
/// memory mutex and pass the locked process table in.
pub struct MemoryManager {
    frame_size: usize,
    ram: Vec<u16>,
    frames: Vec<FrameTableEntry>,
    backing: BackingStore,
    clock: Arc<Clock>,
    stats: VmStats,
}

impl MemoryManager {
    pub fn new(
        total_frames: usize,
        frame_size: usize,
        clock: Arc<Clock>,
        backing: BackingStore,
    ) -> Self {
        Self {
            frame_size,
            ram: vec![0; total_frames * frame_size],
            frames: vec![FrameTableEntry::default(); total_frames],
            backing,
            clock,
            stats: VmStats::default(),
        }
    }

    /// The single entry point for all memory traffic.
    ///
    /// Bounds-checks the address, touches the LRU timestamp, faults the page
    /// in if needed, then performs the read or write. Returns the word read,
    /// or the word written. A write marks the page dirty.
    pub fn access(
        &mut self,
        dir: &mut dyn PageDirectory,
        pid: Pid,
        addr: usize,
        access: Access,
    ) -> Result<u16, MemoryError> {
        let bounds = dir
            .memory_required(pid)
            .ok_or(MemoryError::NoSuchProcess(pid))?;
        if addr >= bounds {
            error!("segmentation fault: pid {pid} addr {addr} (limit {bounds})");
            return Err(MemoryError::SegmentationFault { pid, addr });
        }

        let page = (addr / self.frame_size) as u32;
        let offset = addr % self.frame_size;
        let now = self.clock.now();

        let resident = {
            let table = dir
                .page_table_mut(pid)
                .ok_or(MemoryError::NoSuchProcess(pid))?;
            let entry = table.entry_mut(page);
            entry.last_accessed = now;
            entry.frame
        };

        let frame = match resident {
            Some(frame) => frame,
            None => self.fault_in(dir, pid, page)?,
        };

        let slot = frame * self.frame_size + offset;
        match access {
            Access::Read => Ok(self.ram[slot]),
            Access::Write(value) => {
                self.ram[slot] = value;
                if let Some(table) = dir.page_table_mut(pid) {
                    table.entry_mut(page).dirty = true;
                }
                Ok(value)
            }
        }
    }

    /// Residency test without an LRU touch.
    pub fn is_page_resident(&self, dir: &dyn PageDirectory, pid: Pid, addr: usize) -> bool {
        let page = (addr / self.frame_size) as u32;
        dir.page_table(pid)
            .and_then(|table| table.get(page))
            .map_or(false, |entry| entry.is_resident())
    }

    /// Bring `(pid, page)` into a frame: allocate (evicting if needed), copy
    /// the image from the backing store, and cross-link the frame table and
    /// the owner's page table.
    fn fault_in(
        &mut self,
        dir: &mut dyn PageDirectory,
        pid: Pid,
        page: u32,
    ) -> Result<usize, MemoryError> {
        let frame = self.allocate_frame(dir);

        let start = frame * self.frame_size;
        let frame_size = self.frame_size;
        let (ram, backing) = (&mut self.ram, &mut self.backing);
        ram[start..start + frame_size].copy_from_slice(backing.load(pid, page, frame_size));

        self.stats.pages_paged_in += 1;
        self.frames[frame].owner = Some((pid, page));

        let table = dir
            .page_table_mut(pid)
            .ok_or(MemoryError::NoSuchProcess(pid))?;
        let entry = table.entry_mut(page);
        entry.frame = Some(frame);
        entry.dirty = false;
        entry.last_accessed = self.clock.now();

        debug!("paged in pid {pid} page {page} -> frame {frame}");
        Ok(frame)
    }

    /// A free frame index, evicting the LRU victim when RAM is full. Always
    /// succeeds while at least one frame exists.
    fn allocate_frame(&mut self, dir: &mut dyn PageDirectory) -> usize {
        if let Some(free) = self.frames.iter().position(|f| f.owner.is_none()) {
            return free;
        }
        self.evict_victim(dir)
    }

    /// Pick and evict the occupied frame whose page was least recently
    /// accessed (ties to the lowest frame index). A frame whose owner has
    /// vanished from the directory is reclaimed immediately, with no
    /// write-back. Dirty victims are written back and the store flushed
    /// before the frame is released.
    fn evict_victim(&mut self, dir: &mut dyn PageDirectory) -> usize {
        let mut victim = 0;
        let mut oldest = u64::MAX;
        for (idx, slot) in self.frames.iter().enumerate() {
            let Some((pid, page)) = slot.owner else {
                continue;
            };
            match dir.page_table(pid).and_then(|table| table.get(page)) {
                None => {
                    // Owner gone: nothing to write back, nothing to unlink.
                    self.frames[idx].owner = None;
                    debug!("reclaimed orphaned frame {idx} (pid {pid} page {page})");
                    return idx;
                }
                Some(entry) => {
                    if entry.last_accessed < oldest {
                        oldest = entry.last_accessed;
                        victim = idx;
                    }
                }
            }
        }

        let (pid, page) = self.frames[victim]
            .owner
            .expect("eviction scan over occupied frames");
        let dirty = dir
            .page_table(pid)
            .and_then(|table| table.get(page))
            .map_or(false, |entry| entry.dirty);

        if dirty {
            let start = victim * self.frame_size;
            let image = self.ram[start..start + self.frame_size].to_vec();
            self.backing.store(pid, page, image);
            self.stats.pages_paged_out += 1;
            if let Err(err) = self.backing.flush() {
                error!("backing store flush failed: {err}");
            }
        }

        if let Some(table) = dir.page_table_mut(pid) {
            let entry = table.entry_mut(page);
            entry.frame = None;
            entry.dirty = false;
        }
        self.frames[victim].owner = None;

        debug!("evicted frame {victim} (pid {pid} page {page}, dirty {dirty})");
        victim
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn total_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn free_frame_count(&self) -> usize {
        self.frames.iter().filter(|f| f.owner.is_none()).count()
    }

    /// Bytes of physical RAM backed by occupied frames.
    pub fn used_memory(&self) -> usize {
        (self.total_frames() - self.free_frame_count()) * self.frame_size
    }

    pub fn vm_stats(&self) -> VmStats {
        self.stats
    }

    pub fn frames(&self) -> &[FrameTableEntry] {
        &self.frames
    }
}
