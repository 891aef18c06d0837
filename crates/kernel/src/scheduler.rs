//! The tick-driven multi-core scheduler.
//!
//! One dedicated thread drives all simulated cores serially per tick; cores
//! are logical, not OS threads. Each tick runs the documented phases in
//! order: wake sleepers, release finished cores, assign ready processes,
//! execute one instruction per busy core, reassign freed cores, and finally
//! auto-create a batch process when due.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::debug;
use types::{Pid, ProcessState, SchedulerPolicy, SystemConfig};
use vm::{interp, Process, ProcessTable};

use crate::batch;
use crate::trace::TraceLog;
use crate::Kernel;

const ACTIVE_TICK_DELAY: Duration = Duration::from_millis(5);
const IDLE_TICK_DELAY: Duration = Duration::from_millis(100);
const SPAWN_COOLDOWN: Duration = Duration::from_millis(100);

/// A logical CPU core: at most one running process, plus the quantum that
/// process has left on this core (RR only).
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuCore {
    pub id: usize,
    pub running: Option<Pid>,
    pub quantum_left: u32,
}

pub struct Scheduler {
    kernel: Arc<Kernel>,
    cores: Vec<CpuCore>,
    trace: Option<TraceLog>,
    spawn_cooldown: Duration,
    last_spawn_tick: u64,
    last_spawn_at: Option<Instant>,
}

impl Scheduler {
    pub fn new(kernel: Arc<Kernel>) -> Self {
        let cores = (0..kernel.config.num_cpu)
            .map(|id| CpuCore {
                id,
                running: None,
                quantum_left: 0,
            })
            .collect();
        Self {
            kernel,
            cores,
            trace: None,
            spawn_cooldown: SPAWN_COOLDOWN,
            last_spawn_tick: 0,
            last_spawn_at: None,
        }
    }

    pub fn with_trace(mut self, trace: TraceLog) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Override the wall-clock cooldown between auto-created processes.
    /// Deterministic harnesses set this to zero.
    pub fn with_spawn_cooldown(mut self, cooldown: Duration) -> Self {
        self.spawn_cooldown = cooldown;
        self
    }

    pub fn cores(&self) -> &[CpuCore] {
        &self.cores
    }

    /// Thread body: tick while there is work, pause while idle, and return
    /// once the table has drained (or shutdown was requested).
    pub fn run(mut self) {
        loop {
            if !self.kernel.scheduler_running.load(Ordering::Acquire) {
                break;
            }

            let active = {
                let procs = self.kernel.procs.lock().unwrap();
                procs.has_active()
            } || self.kernel.auto_create.load(Ordering::Acquire);

            if active {
                thread::sleep(ACTIVE_TICK_DELAY);
                self.tick();
            } else {
                thread::sleep(IDLE_TICK_DELAY);
            }

            let drained = {
                let procs = self.kernel.procs.lock().unwrap();
                procs.all_terminal()
            } && !self.kernel.auto_create.load(Ordering::Acquire);

            if drained {
                self.kernel
                    .scheduler_running
                    .store(false, Ordering::Release);
                println!(
                    "[Tick {}] Scheduler halted (all processes finished).",
                    self.kernel.clock.now()
                );
                break;
            }
        }
    }

    /// One full scheduler iteration. Public so tests and headless embeddings
    /// can drive the simulation deterministically, without the thread or its
    /// sleeps.
    pub fn tick(&mut self) {
        let kernel = Arc::clone(&self.kernel);
        let tick = kernel.clock.advance();
        let mut mem = kernel.memory.lock().unwrap();
        let mut procs = kernel.procs.lock().unwrap();
        let config = &kernel.config;

        // Wake: a sleeper whose counter hits zero becomes ready this tick.
        for process in procs.processes_mut() {
            if process.state == ProcessState::Sleeping {
                if process.sleep_counter > 0 {
                    process.sleep_counter -= 1;
                }
                if process.sleep_counter == 0 {
                    process.state = ProcessState::Ready;
                }
            }
        }

        // Release cores whose process is terminal, gone, or no longer
        // running (a process-screen `step` can suspend it between ticks).
        for core in &mut self.cores {
            if let Some(pid) = core.running {
                let running = procs
                    .get(pid)
                    .map_or(false, |p| p.state == ProcessState::Running);
                if !running {
                    core.running = None;
                }
            }
        }

        Self::assign(&mut self.cores, &mut procs, config);

        // Execute one instruction per busy core.
        let rr = config.scheduler == SchedulerPolicy::RoundRobin;
        let mut reschedule = false;
        for core in &mut self.cores {
            let Some(pid) = core.running else {
                reschedule = true;
                continue;
            };
            if procs.get(pid).map(|p| p.state) != Some(ProcessState::Running) {
                continue;
            }

            if let Some(trace) = &mut self.trace {
                if let Some(process) = procs.get(pid) {
                    if !process.is_done() {
                        trace.record(config, tick, process);
                    }
                }
            }

            interp::step(&mut procs, &mut mem, pid);

            if rr && core.quantum_left > 0 {
                core.quantum_left -= 1;
            }

            let process = procs.get(pid).expect("running process stays in table");
            match process.state {
                ProcessState::Finished => {
                    core.running = None;
                    reschedule = true;
                }
                ProcessState::MemoryViolated => {
                    println!(
                        "Process {} ({}) terminated due to Memory Violation.",
                        process.name, process.pid
                    );
                    core.running = None;
                    reschedule = true;
                }
                ProcessState::Sleeping => {
                    core.running = None;
                    reschedule = true;
                }
                _ => {
                    if process.is_done() {
                        if let Some(process) = procs.get_mut(pid) {
                            process.state = ProcessState::Finished;
                        }
                        core.running = None;
                        reschedule = true;
                    } else if rr && core.quantum_left == 0 {
                        if procs.any_ready_except(pid) {
                            // Preempt; the cursor moves just past us so the
                            // scan resumes fairly.
                            let index = procs.index_of(pid).unwrap_or(0);
                            if let Some(process) = procs.get_mut(pid) {
                                process.state = ProcessState::Ready;
                            }
                            core.running = None;
                            reschedule = true;
                            let len = procs.len();
                            procs.rr_cursor = (index + 1) % len;
                            debug!("preempted pid {pid} at tick {tick}");
                        } else {
                            core.quantum_left = config.quantum_cycles;
                        }
                    }
                }
            }
        }

        if reschedule {
            Self::assign(&mut self.cores, &mut procs, config);
        }

        self.maybe_spawn(tick, &mut procs);
    }

    /// Hand each idle core the next READY process under the active policy.
    fn assign(cores: &mut [CpuCore], procs: &mut ProcessTable, config: &SystemConfig) {
        let len = procs.len();
        if len == 0 {
            procs.rr_cursor = 0;
            return;
        }
        if procs.rr_cursor >= len {
            procs.rr_cursor %= len;
        }

        for core in cores {
            if core.running.is_some() {
                continue;
            }
            let chosen = match config.scheduler {
                SchedulerPolicy::RoundRobin => (0..len)
                    .map(|offset| (procs.rr_cursor + offset) % len)
                    .find(|&idx| procs.processes()[idx].state == ProcessState::Ready),
                SchedulerPolicy::Fcfs => {
                    (0..len).find(|&idx| procs.processes()[idx].state == ProcessState::Ready)
                }
            };
            let Some(index) = chosen else {
                continue;
            };
            if config.scheduler == SchedulerPolicy::RoundRobin {
                procs.rr_cursor = (index + 1) % len;
            }
            let process = &mut procs.processes_mut()[index];
            process.state = ProcessState::Running;
            core.running = Some(process.pid);
            core.quantum_left = match config.scheduler {
                SchedulerPolicy::RoundRobin => config.quantum_cycles,
                SchedulerPolicy::Fcfs => 0,
            };
        }
    }

    /// Auto-create one process when the batch frequency divides the tick,
    /// rate-limited to one per tick and by the wall-clock cooldown.
    fn maybe_spawn(&mut self, tick: u64, procs: &mut ProcessTable) {
        if !self.kernel.auto_create.load(Ordering::Acquire) {
            return;
        }
        let freq = self.kernel.config.batch_process_freq;
        if freq == 0 || tick % freq != 0 || tick == self.last_spawn_tick {
            return;
        }
        if let Some(at) = self.last_spawn_at {
            if at.elapsed() < self.spawn_cooldown {
                return;
            }
        }

        let config = &self.kernel.config;
        let count = batch::random_instruction_count(config);
        let mem_size = batch::random_memory_size(config);
        let program = batch::random_program(count, mem_size);
        let pid = procs.allocate_pid();
        let name = format!("auto_p{pid}");
        procs.insert(Process::new(
            pid,
            name,
            mem_size,
            config.pages_for(mem_size),
            program,
        ));

        self.last_spawn_tick = tick;
        self.last_spawn_at = Some(Instant::now());
        debug!("auto-created process {pid} at tick {tick}");
    }
}

/// Start the scheduler thread unless it is already running.
pub fn ensure_active(kernel: &Arc<Kernel>) {
    if kernel.scheduler_running.swap(true, Ordering::AcqRel) {
        return;
    }
    let kernel = Arc::clone(kernel);
    thread::spawn(move || {
        let scheduler = match TraceLog::open(TraceLog::DEFAULT_PATH) {
            Ok(trace) => Scheduler::new(Arc::clone(&kernel)).with_trace(trace),
            Err(err) => {
                log::warn!("trace log unavailable: {err}");
                Scheduler::new(Arc::clone(&kernel))
            }
        };
        scheduler.run();
    });
    println!("Scheduler thread started.");
}
