//! Cycle-stepped simulation of a small operating system scheduler.

pub mod io;
pub mod kernel;

pub use kernel::{Driver, KernelError, Pid, ProcessState, SchedulingAlgorithm, SimulationConfig, Snapshot};
