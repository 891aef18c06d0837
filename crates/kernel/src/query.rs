//! Read-only snapshots for reporters.
//!
//! Reporters copy what they need while briefly holding the locks, then
//! format and print with no lock held, so console I/O never stalls the
//! scheduler.

use memory::{Access, VmStats};
use types::{Pid, ProcessState};

use crate::Kernel;

#[derive(Debug, Clone)]
pub struct ProcessSnapshot {
    pub pid: Pid,
    pub name: String,
    pub state: ProcessState,
    pub pc: usize,
    pub program_len: usize,
    pub memory_required: usize,
    pub pages_total: usize,
    pub pages_resident: usize,
    pub pages_dirty: usize,
    pub symbols: Vec<(String, usize)>,
    pub logs: Vec<String>,
    pub page_rows: Vec<PageRow>,
}

#[derive(Debug, Clone, Copy)]
pub struct PageRow {
    pub page: u32,
    pub frame: Option<usize>,
    pub dirty: bool,
    pub last_accessed: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct MemoryGauges {
    pub total_bytes: usize,
    pub used_bytes: usize,
    pub free_bytes: usize,
    pub total_frames: usize,
    pub free_frames: usize,
    pub frame_size: usize,
}

#[derive(Debug, Clone)]
pub struct SystemSnapshot {
    pub tick: u64,
    pub num_cpu: usize,
    pub rr_cursor: usize,
    pub processes: Vec<ProcessSnapshot>,
    pub gauges: MemoryGauges,
    pub vm: VmStats,
}

impl SystemSnapshot {
    pub fn count(&self, state: ProcessState) -> usize {
        self.processes.iter().filter(|p| p.state == state).count()
    }
}

impl Kernel {
    /// Copy the whole observable system state. Lock order: memory, then
    /// processes.
    pub fn snapshot(&self) -> SystemSnapshot {
        let mem = self.memory.lock().unwrap();
        let procs = self.procs.lock().unwrap();

        let processes = procs
            .processes()
            .iter()
            .map(|p| ProcessSnapshot {
                pid: p.pid,
                name: p.name.clone(),
                state: p.state,
                pc: p.pc,
                program_len: p.program.len(),
                memory_required: p.memory_required,
                pages_total: p.page_table.len(),
                pages_resident: p.page_table.resident_pages(),
                pages_dirty: p.page_table.dirty_pages(),
                symbols: p.symbols.iter().map(|(k, v)| (k.clone(), *v)).collect(),
                logs: p.logs.clone(),
                page_rows: p
                    .page_table
                    .iter()
                    .map(|(page, entry)| PageRow {
                        page,
                        frame: entry.frame,
                        dirty: entry.dirty,
                        last_accessed: entry.last_accessed,
                    })
                    .collect(),
            })
            .collect();

        let total_bytes = mem.total_frames() * mem.frame_size();
        let used_bytes = mem.used_memory();
        SystemSnapshot {
            tick: self.clock.now(),
            num_cpu: self.config.num_cpu,
            rr_cursor: procs.rr_cursor,
            processes,
            gauges: MemoryGauges {
                total_bytes,
                used_bytes,
                free_bytes: total_bytes - used_bytes,
                total_frames: mem.total_frames(),
                free_frames: mem.free_frame_count(),
                frame_size: mem.frame_size(),
            },
            vm: mem.vm_stats(),
        }
    }

    /// Live values of a process's variables, by process name. Values on
    /// swapped-out pages are reported as `None` rather than forcing a
    /// fault-in; resident values go through the normal access path, whose
    /// LRU touch is acceptable for an inspection command.
    pub fn variable_values(&self, name: &str) -> Option<Vec<(String, usize, Option<u16>)>> {
        let mut mem = self.memory.lock().unwrap();
        let mut procs = self.procs.lock().unwrap();

        let (pid, symbols) = {
            let process = procs.find_by_name(name)?;
            let symbols: Vec<(String, usize)> = process
                .symbols
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect();
            (process.pid, symbols)
        };

        let mut rows = Vec::with_capacity(symbols.len());
        for (var, addr) in symbols {
            let value = if mem.is_page_resident(&*procs, pid, addr) {
                mem.access(&mut *procs, pid, addr, Access::Read).ok()
            } else {
                None
            };
            rows.push((var, addr, value));
        }
        Some(rows)
    }
}
