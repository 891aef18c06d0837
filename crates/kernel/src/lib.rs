pub mod batch;
pub mod query;
pub mod scheduler;
pub mod trace;

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use memory::{BackingStore, MemoryManager};
use types::{Clock, Pid, SystemConfig};
use vm::{Instruction, Process, ProcessTable};

/// The shared simulator context: configuration, the tick clock, the paging
/// layer, and the process table. The REPL thread and the scheduler thread
/// each hold an `Arc<Kernel>`.
///
/// Lock order: when both locks are needed, `memory` is acquired before
/// `procs`. The memory manager reaches page tables through the already
/// locked table (`PageDirectory`), so it never takes a lock itself.
pub struct Kernel {
    pub config: SystemConfig,
    pub clock: Arc<Clock>,
    pub memory: Mutex<MemoryManager>,
    pub procs: Mutex<ProcessTable>,
    /// Batch auto-creation toggle (`scheduler start` / `scheduler stop`).
    pub auto_create: AtomicBool,
    /// Set while the scheduler thread runs; cleared on drain or shutdown.
    pub scheduler_running: AtomicBool,
}

/// Why a process could not be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpawnError {
    DuplicateName(String),
    NotPowerOfTwo(usize),
    OutOfRange {
        bytes: usize,
        min: usize,
        max: usize,
    },
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnError::DuplicateName(name) => write!(f, "process {name} already exists"),
            SpawnError::NotPowerOfTwo(bytes) => {
                write!(f, "memory must be a power of 2, got {bytes}")
            }
            SpawnError::OutOfRange { bytes, min, max } => {
                write!(f, "memory {bytes} outside allowed range [{min}, {max}]")
            }
        }
    }
}

impl std::error::Error for SpawnError {}

impl Kernel {
    /// Build the context from a validated configuration. The backing store
    /// has already truncated its on-disk file.
    pub fn new(config: SystemConfig, backing: BackingStore) -> Self {
        let clock = Arc::new(Clock::new());
        let memory = MemoryManager::new(
            config.total_frames(),
            config.mem_per_frame,
            Arc::clone(&clock),
            backing,
        );
        Self {
            config,
            clock,
            memory: Mutex::new(memory),
            procs: Mutex::new(ProcessTable::new()),
            auto_create: AtomicBool::new(false),
            scheduler_running: AtomicBool::new(false),
        }
    }

    /// Convenience constructor using the default backing store path.
    pub fn with_default_backing(config: SystemConfig) -> io::Result<Self> {
        let backing = BackingStore::create(BackingStore::DEFAULT_PATH)?;
        Ok(Self::new(config, backing))
    }

    /// Validate and insert a user-created process. `memory_required` must be
    /// a power of two within the configured per-process range, and the name
    /// must be unused.
    pub fn create_process(
        &self,
        name: &str,
        memory_required: usize,
        program: Vec<Instruction>,
    ) -> Result<Pid, SpawnError> {
        if !memory_required.is_power_of_two() {
            return Err(SpawnError::NotPowerOfTwo(memory_required));
        }
        let (min, max) = (self.config.min_mem_per_proc, self.config.max_mem_per_proc);
        if memory_required < min || memory_required > max {
            return Err(SpawnError::OutOfRange {
                bytes: memory_required,
                min,
                max,
            });
        }

        let pages = self.config.pages_for(memory_required);
        let mut procs = self.procs.lock().unwrap();
        if procs.find_by_name(name).is_some() {
            return Err(SpawnError::DuplicateName(name.to_string()));
        }
        let pid = procs.allocate_pid();
        procs.insert(Process::new(
            pid,
            name.to_string(),
            memory_required,
            pages,
            program,
        ));
        Ok(pid)
    }

    /// Orderly shutdown: stop auto-creation and ask the scheduler thread to
    /// return at its next loop check.
    pub fn request_shutdown(&self) {
        self.auto_create.store(false, Ordering::Release);
        self.scheduler_running.store(false, Ordering::Release);
    }
}
