use std::fmt;

use serde::Serialize;

use super::memory::{Region, HEADER_WORDS};
use super::Pid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ProcessState {
    Ready,
    Running,
    Blocked,
    Terminated,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessState::Ready => "Ready",
            ProcessState::Running => "Running",
            ProcessState::Blocked => "Blocked",
            ProcessState::Terminated => "Terminated",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProcessControlBlock {
    pub state: ProcessState,
    /// Absolute arena index of the next instruction.
    pub program_counter: usize,
    pub priority: usize,
    pub time_in_queue: u64,
    pub current_instruction: String,
    pub level_ticks: usize,
    pub deadlock_retries: u32,

    id: Pid,
    arrival_time: u64,
    region: Region,
}

impl ProcessControlBlock {
    pub fn new(id: Pid, region: Region, arrival_time: u64) -> ProcessControlBlock {
        ProcessControlBlock {
            id,
            arrival_time,
            region,
            program_counter: region.lower + HEADER_WORDS,
            priority: 0,
            state: ProcessState::Ready,
            time_in_queue: 0,
            current_instruction: String::new(),
            level_ticks: 0,
            deadlock_retries: 0,
        }
    }

    pub fn get_id(&self) -> Pid {
        self.id
    }

    pub fn get_arrival_time(&self) -> u64 {
        self.arrival_time
    }

    pub fn get_region(&self) -> Region {
        self.region
    }

    pub fn get_mem_start_address(&self) -> usize {
        self.region.lower
    }

    pub fn get_mem_end_address(&self) -> usize {
        self.region.upper
    }

    pub fn is_finished(&self) -> bool {
        self.program_counter >= self.region.instructions_end()
    }
}
