mod config;
mod cpu;
mod deadlock;
mod driver;
mod error;
mod long_term_scheduler;
mod machine;
mod memory;
mod mutex;
mod process_control_block;
mod process_table;
mod queue;
mod short_term_scheduler;
mod snapshot;

/// Process identifier. Zero is never a valid pid.
pub type Pid = u32;

pub use config::{
    ConfigError, SimulationConfig, DEFAULT_DEADLOCK_RETRY_BUDGET, DEFAULT_DEADLOCK_THRESHOLD,
    DEFAULT_MAX_CYCLES, DEFAULT_MEMORY_SIZE, DEFAULT_MLFQ_QUANTA, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_RR_QUANTUM, MLFQ_LEVELS,
};
pub use cpu::{AssignSource, Instruction};
pub use driver::Driver;
pub use error::KernelError;
pub use memory::{HeaderWord, Region, Variable, Word, HEADER_WORDS, VARIABLE_WORDS};
pub use mutex::Resource;
pub use process_control_block::{ProcessControlBlock, ProcessState};
pub use short_term_scheduler::SchedulingAlgorithm;
pub use snapshot::{InputRequestView, MutexView, ProcessView, Snapshot};
