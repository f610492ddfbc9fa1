use std::fmt;

use super::Pid;

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum KernelError {
    OutOfMemory { needed: usize, available: usize },
    InvalidPid(Pid),
    NotFound(Pid),
    EmptyProgram,
    VariableNotFound { pid: Pid, name: String },
    VariableSlotsFull { pid: Pid, name: String },
    InvalidInstruction(String),
    QueueFull { pid: Pid, capacity: usize },
    NoPendingInput,
    InvalidQuantum(usize),
    UnknownPolicy(String),
    UnknownResource(String),
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory { needed, available } => {
                write!(f, "not enough memory: needed {needed}, available {available}")
            }
            Self::InvalidPid(pid) => write!(f, "invalid or duplicate pid {pid}"),
            Self::NotFound(pid) => write!(f, "no live process with pid {pid}"),
            Self::EmptyProgram => write!(f, "program has no instructions"),
            Self::VariableNotFound { pid, name } => {
                write!(f, "PID {pid}: variable {name} not found")
            }
            Self::VariableSlotsFull { pid, name } => {
                write!(f, "PID {pid}: no empty variable slot for {name}")
            }
            Self::InvalidInstruction(line) => write!(f, "invalid instruction: {line}"),
            Self::QueueFull { pid, capacity } => {
                write!(f, "queue is full ({capacity}), cannot enqueue PID {pid}")
            }
            Self::NoPendingInput => write!(f, "no process is waiting for input"),
            Self::InvalidQuantum(quantum) => write!(f, "invalid quantum {quantum}"),
            Self::UnknownPolicy(name) => write!(f, "unknown scheduling policy: {name}"),
            Self::UnknownResource(name) => write!(f, "unknown resource: {name}"),
        }
    }
}

impl std::error::Error for KernelError {}
