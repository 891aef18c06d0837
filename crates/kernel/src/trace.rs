use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use chrono::Local;
use types::{SchedulerPolicy, SystemConfig};
use vm::Process;

/// Appending writer for the per-instruction execution trace.
///
/// One line is written immediately before each scheduled execution, carrying
/// the wall clock, the tick, the quantum position (RR) or policy tag (FCFS),
/// and the instruction about to run.
pub struct TraceLog {
    file: File,
}

impl TraceLog {
    pub const DEFAULT_PATH: &'static str = "csopesy-trace.txt";

    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }

    pub fn record(&mut self, config: &SystemConfig, tick: u64, process: &Process) {
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let policy = match config.scheduler {
            SchedulerPolicy::RoundRobin if config.quantum_cycles > 0 => {
                let position = (process.pc as u32 % config.quantum_cycles) + 1;
                format!(" | Q{}/{}", position, config.quantum_cycles)
            }
            SchedulerPolicy::Fcfs => " | FCFS".to_string(),
            SchedulerPolicy::RoundRobin => String::new(),
        };
        let repr = process
            .program
            .get(process.pc)
            .map(|inst| inst.to_string())
            .unwrap_or_default();
        let line = format!(
            "[{stamp}] [Tick {tick}{policy}] {} [PID {}] pc={}/{} -> {} | State={}\n",
            process.name,
            process.pid,
            process.pc,
            process.program.len(),
            repr,
            process.state,
        );
        if let Err(err) = self.file.write_all(line.as_bytes()) {
            log::warn!("trace write failed: {err}");
        }
    }
}
