use std::collections::{BTreeMap, VecDeque};

use super::memory::{Memory, Region, Word};
use super::mutex::{MutexSet, Resource, SignalOutcome};
use super::process_table::ProcessTable;
use super::queue::ReadyQueues;
use super::{KernelError, Pid, ProcessControlBlock, ProcessState, SimulationConfig, MLFQ_LEVELS};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct InputRequest {
    pub pid: Pid,
    pub variable: String,
}

pub(crate) struct Machine {
    pub config: SimulationConfig,
    pub memory: Memory,
    pub processes: ProcessTable,
    pub mutexes: MutexSet,
    pub ready: ReadyQueues,
    pub clock: u64,
    pub running: Option<Pid>,
    pub input_requests: VecDeque<InputRequest>,
    pub terminated: BTreeMap<Pid, ProcessControlBlock>,
    events: Vec<String>,
}

impl Machine {
    pub fn new(config: SimulationConfig) -> Machine {
        let mut ready = ReadyQueues::new(MLFQ_LEVELS, config.queue_capacity);
        ready.rebalance(config.policy.levels(), |_| 0);

        Machine {
            memory: Memory::new(config.memory_size),
            processes: ProcessTable::new(),
            mutexes: MutexSet::new(config.queue_capacity),
            ready,
            clock: 0,
            running: None,
            input_requests: VecDeque::new(),
            terminated: BTreeMap::new(),
            events: Vec::new(),
            config,
        }
    }

    pub fn reset(&mut self) {
        *self = Machine::new(self.config.clone());
    }

    pub fn record(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::info!("{}", message);
        self.events.push(message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}", message);
        self.events.push(message);
    }

    pub fn events(&self) -> &[String] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<String> {
        std::mem::take(&mut self.events)
    }

    pub fn spawn(&mut self, pid: Pid, lines: &[String], arrival_time: u64) -> Result<Region, KernelError> {
        if pid == 0 || self.processes.contains(pid) {
            return Err(KernelError::InvalidPid(pid));
        }
        if lines.is_empty() {
            return Err(KernelError::EmptyProgram);
        }

        let region = self.memory.allocate(pid, lines.len())?;
        let words = lines.iter().map(|line| Word::Instruction(line.clone())).collect();
        self.memory.write_block_to(region.instructions_start(), words);

        let pcb = ProcessControlBlock::new(pid, region, arrival_time);
        self.memory.write_header(&pcb);
        if let Err(err) = self.processes.register(pcb) {
            self.memory.reclaim(region);
            return Err(err);
        }
        self.terminated.remove(&pid);

        self.record(format!(
            "Created PID {}: memory [{}, {}], arrival {}",
            pid, region.lower, region.upper, arrival_time
        ));
        Ok(region)
    }

    pub fn priority_of(&self, pid: Pid) -> Option<usize> {
        self.processes.get(pid).ok().map(|pcb| pcb.priority)
    }

    pub fn state_of(&self, pid: Pid) -> Option<ProcessState> {
        match self.processes.get(pid) {
            Ok(pcb) => Some(pcb.state),
            Err(_) => self.terminated.get(&pid).map(|pcb| pcb.state),
        }
    }

    pub fn is_awaiting_input(&self, pid: Pid) -> bool {
        self.input_requests.iter().any(|request| request.pid == pid)
    }

    pub fn sync_header(&mut self, pid: Pid) {
        if let Ok(pcb) = self.processes.get(pid) {
            self.memory.write_header(pcb);
        }
    }

    pub fn set_state(&mut self, pid: Pid, state: ProcessState) -> Result<(), KernelError> {
        self.processes.update(pid, |pcb| pcb.state = state)?;
        self.sync_header(pid);
        Ok(())
    }

    pub fn make_ready(&mut self, pid: Pid) -> Result<usize, KernelError> {
        let priority = self.priority_of(pid).ok_or(KernelError::NotFound(pid))?;
        let level = self.ready.enqueue(pid, priority)?;
        self.set_state(pid, ProcessState::Ready)?;
        Ok(level)
    }

    pub fn block(&mut self, pid: Pid, resource: Resource) -> Result<(), KernelError> {
        self.set_state(pid, ProcessState::Blocked)?;
        self.ready.remove(pid);
        if self.running == Some(pid) {
            self.running = None;
        }

        self.record(format!("PID {}: Blocked on {}", pid, resource));
        Ok(())
    }

    pub fn release_mutex(&mut self, resource: Resource, pid: Pid) -> SignalOutcome {
        let processes = &self.processes;
        let outcome = self
            .mutexes
            .get_mut(resource)
            .signal(pid, |waiter| processes.get(waiter).ok().map(|pcb| pcb.priority));

        if let SignalOutcome::HandedOff(next) = outcome {
            match self.make_ready(next) {
                Ok(level) => self.record(format!(
                    "PID {}: Unblocked, now owns {} (Queue {})",
                    next, resource, level
                )),
                Err(err) => self.warn(format!("PID {}: failed to unblock: {}", next, err)),
            }
        }

        outcome
    }

    pub fn terminate(&mut self, pid: Pid) {
        for resource in self.mutexes.owned_by(pid) {
            self.record(format!("Releasing {} held by terminating PID {}", resource, pid));
            self.release_mutex(resource, pid);
        }
        self.mutexes.remove_waiter(pid);
        self.ready.remove(pid);
        self.input_requests.retain(|request| request.pid != pid);
        if self.running == Some(pid) {
            self.running = None;
        }

        match self.processes.remove(pid) {
            Ok(mut pcb) => {
                pcb.state = ProcessState::Terminated;
                self.memory.reclaim(pcb.get_region());
                self.terminated.insert(pid, pcb);
                self.record(format!(
                    "Freed PID {}, available memory: {}",
                    pid,
                    self.memory.free_words()
                ));
            }
            Err(err) => self.warn(format!("PID {}: not found for termination: {}", pid, err)),
        }
    }

    pub fn tick_queue_times(&mut self) {
        let ready = (0..self.ready.active_levels()).flat_map(|level| self.ready.level(level).to_vec());
        let queued: Vec<Pid> = ready.chain(self.mutexes.blocked_pids()).collect();

        for pid in queued {
            let _ = self.processes.update(pid, |pcb| pcb.time_in_queue += 1);
        }
    }
}
