pub mod clock;
pub mod config;
pub mod process;

pub use clock::Clock;
pub use config::{SchedulerPolicy, SystemConfig};
pub use process::{Pid, ProcessState};
