/// Scheduling policy over the shared ready set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPolicy {
    RoundRobin,
    Fcfs,
}

impl SchedulerPolicy {
    /// Case-insensitive parse of the `scheduler` config value.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "rr" => Some(SchedulerPolicy::RoundRobin),
            "fcfs" => Some(SchedulerPolicy::Fcfs),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SchedulerPolicy::RoundRobin => "rr",
            SchedulerPolicy::Fcfs => "fcfs",
        }
    }
}

/// The full simulator configuration, normally read from `config.txt`.
///
/// `delays_per_exec` is accepted and reported for compatibility with the
/// config format but does not influence the tick loop.
#[derive(Debug, Clone)]
pub struct SystemConfig {
    pub num_cpu: usize,
    pub scheduler: SchedulerPolicy,
    pub quantum_cycles: u32,
    pub batch_process_freq: u64,
    pub min_ins: usize,
    pub max_ins: usize,
    pub delays_per_exec: u32,
    pub max_overall_mem: usize,
    pub mem_per_frame: usize,
    pub min_mem_per_proc: usize,
    pub max_mem_per_proc: usize,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            num_cpu: 4,
            scheduler: SchedulerPolicy::RoundRobin,
            quantum_cycles: 2,
            batch_process_freq: 3,
            min_ins: 5,
            max_ins: 10,
            delays_per_exec: 1,
            max_overall_mem: 16384,
            mem_per_frame: 16,
            min_mem_per_proc: 4096,
            max_mem_per_proc: 4096,
        }
    }
}

impl SystemConfig {
    /// Number of physical frames the paging layer manages.
    pub fn total_frames(&self) -> usize {
        self.max_overall_mem / self.mem_per_frame
    }

    /// Pages needed to cover `bytes` of virtual address space.
    pub fn pages_for(&self, bytes: usize) -> usize {
        (bytes + self.mem_per_frame - 1) / self.mem_per_frame
    }

    /// A config is usable when it yields at least one core and one frame and
    /// its ranges are ordered. Anything else is regenerated from defaults.
    pub fn is_valid(&self) -> bool {
        self.num_cpu > 0
            && self.mem_per_frame > 0
            && self.max_overall_mem >= self.mem_per_frame
            && self.min_ins > 0
            && self.max_ins >= self.min_ins
            && self.min_mem_per_proc > 0
            && self.max_mem_per_proc >= self.min_mem_per_proc
    }
}
