use core::fmt;

/// Process identifier. Assigned monotonically by the process table, starting
/// at 1. Components refer to processes by pid, never by reference, so the
/// table is free to grow while pids stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub u32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a simulated process.
///
/// Only `Finished` and `MemoryViolated` are terminal; a terminal process is
/// never selected by the scheduler again, though it stays in the table for
/// reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Ready,
    Running,
    Sleeping,
    Finished,
    MemoryViolated,
}

impl ProcessState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessState::Finished | ProcessState::MemoryViolated)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProcessState::Ready => "READY",
            ProcessState::Running => "RUNNING",
            ProcessState::Sleeping => "SLEEPING",
            ProcessState::Finished => "FINISHED",
            ProcessState::MemoryViolated => "MEMORY_VIOLATED",
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
