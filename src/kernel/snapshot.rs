use serde::Serialize;

use super::machine::Machine;
use super::memory::Word;
use super::mutex::{Mutex, Resource};
use super::{Pid, ProcessControlBlock, ProcessState, SchedulingAlgorithm};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProcessView {
    pub pid: Pid,
    pub state: ProcessState,
    pub priority: usize,
    pub program_counter: usize,
    pub lower_bound: usize,
    pub upper_bound: usize,
    pub arrival_time: u64,
    pub time_in_queue: u64,
    pub current_instruction: String,
    pub deadlock_retries: u32,
    pub waiting_on: Option<Resource>,
}

impl ProcessView {
    fn capture(pcb: &ProcessControlBlock, machine: &Machine) -> ProcessView {
        ProcessView {
            pid: pcb.get_id(),
            state: pcb.state,
            priority: pcb.priority,
            program_counter: pcb.program_counter,
            lower_bound: pcb.get_mem_start_address(),
            upper_bound: pcb.get_mem_end_address(),
            arrival_time: pcb.get_arrival_time(),
            time_in_queue: pcb.time_in_queue,
            current_instruction: pcb.current_instruction.clone(),
            deadlock_retries: pcb.deadlock_retries,
            waiting_on: machine.mutexes.waiting_on(pcb.get_id()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MutexView {
    pub resource: Resource,
    pub locked: bool,
    pub owner: Option<Pid>,
    pub waiters: Vec<Pid>,
}

impl MutexView {
    fn capture(mutex: &Mutex) -> MutexView {
        MutexView {
            resource: mutex.resource(),
            locked: mutex.is_locked(),
            owner: mutex.owner(),
            waiters: mutex.waiters().to_vec(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InputRequestView {
    pub pid: Pid,
    pub variable: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub clock: u64,
    pub policy: SchedulingAlgorithm,
    pub rr_quantum: usize,
    pub running: Option<Pid>,
    pub processes: Vec<ProcessView>,
    pub ready_queues: Vec<Vec<Pid>>,
    pub pending_arrivals: Vec<Pid>,
    pub blocked: Vec<Pid>,
    pub mutexes: Vec<MutexView>,
    pub available_memory: usize,
    pub allocatable_memory: usize,
    pub memory: Vec<Word>,
    pub pending_input: Vec<InputRequestView>,
    pub terminated: Vec<Pid>,
}

impl Snapshot {
    pub(crate) fn capture(
        machine: &Machine,
        policy: SchedulingAlgorithm,
        rr_quantum: usize,
        pending_arrivals: Vec<Pid>,
    ) -> Snapshot {
        Snapshot {
            clock: machine.clock,
            policy,
            rr_quantum,
            running: machine.running,
            processes: machine.processes.iter().map(|pcb| ProcessView::capture(pcb, machine)).collect(),
            ready_queues: machine.ready.to_vecs(),
            pending_arrivals,
            blocked: machine.mutexes.blocked_pids(),
            mutexes: machine.mutexes.iter().map(MutexView::capture).collect(),
            available_memory: machine.memory.free_words(),
            allocatable_memory: machine.memory.get_remaining_memory(),
            memory: machine.memory.words().to_vec(),
            pending_input: machine
                .input_requests
                .iter()
                .map(|request| InputRequestView {
                    pid: request.pid,
                    variable: request.variable.clone(),
                })
                .collect(),
            terminated: machine.terminated.keys().copied().collect(),
        }
    }

    pub fn process(&self, pid: Pid) -> Option<&ProcessView> {
        self.processes.iter().find(|process| process.pid == pid)
    }

    pub fn mutex(&self, resource: Resource) -> Option<&MutexView> {
        self.mutexes.iter().find(|mutex| mutex.resource == resource)
    }

    pub fn is_queued(&self, pid: Pid) -> bool {
        self.ready_queues.iter().any(|queue| queue.contains(&pid))
    }
}
