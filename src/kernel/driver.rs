use super::deadlock;
use super::long_term_scheduler::LongTermScheduler;
use super::machine::Machine;
use super::short_term_scheduler::ShortTermScheduler;
use super::{KernelError, Pid, ProcessState, SchedulingAlgorithm, SimulationConfig, Snapshot};

pub struct Driver {
    machine: Machine,
    lts: LongTermScheduler,
    sts: ShortTermScheduler,
    next_pid: Pid,
}

impl Driver {
    pub fn new() -> Driver {
        Driver::with_config(SimulationConfig::default())
    }

    pub fn with_config(config: SimulationConfig) -> Driver {
        let sts = ShortTermScheduler::new(config.policy, config.mlfq_quanta, config.rr_quantum);

        Driver {
            machine: Machine::new(config),
            lts: LongTermScheduler::new(),
            sts,
            next_pid: 1,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.machine.config
    }

    pub fn clock(&self) -> u64 {
        self.machine.clock
    }

    pub fn load_program<S: AsRef<str>>(&mut self, source: &[S], pid: Pid) -> Result<(), KernelError> {
        let arrival_time = self.machine.clock;
        self.create_process(source, pid, arrival_time)
    }

    pub fn add_process<S: AsRef<str>>(&mut self, source: &[S], arrival_time: u64) -> Result<Pid, KernelError> {
        let pid = self.next_pid;
        self.create_process(source, pid, arrival_time)?;
        Ok(pid)
    }

    fn create_process<S: AsRef<str>>(&mut self, source: &[S], pid: Pid, arrival_time: u64) -> Result<(), KernelError> {
        let lines: Vec<String> = source
            .iter()
            .map(|line| line.as_ref().trim())
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        if let Err(err) = self.machine.spawn(pid, &lines, arrival_time) {
            self.machine.warn(format!("Cannot load PID {}: {}", pid, err));
            return Err(err);
        }
        self.next_pid = self.next_pid.max(pid.saturating_add(1));

        self.lts.schedule_arrival(pid, arrival_time);
        self.admit_arrivals();
        Ok(())
    }

    fn admit_arrivals(&mut self) {
        for pid in self.lts.batch_step(self.machine.clock) {
            if !self.machine.processes.contains(pid) {
                continue;
            }

            match self.machine.make_ready(pid) {
                Ok(_) => self.machine.record(format!("PID {}: Arrived", pid)),
                Err(err) => self.machine.warn(format!("PID {}: {}", pid, err)),
            }
        }
    }

    pub fn advance_cycle(&mut self) {
        self.sts.apply_pending(&mut self.machine);
        self.admit_arrivals();

        let label = self.sts.scheduling_alg().label();
        self.machine.record(format!("{} Cycle {}", label, self.machine.clock + 1));

        let report = self.sts.run_cycle(&mut self.machine);
        self.machine.clock += 1;
        deadlock::detect_and_recover(&mut self.machine, report.advanced);
        self.machine.tick_queue_times();

        if report.executed.is_none() && self.all_finished() {
            self.machine.record(format!("All processes finished ({})", label));
        }
    }

    /// Advances until every process finished, input is needed or the
    /// configured cycle limit is hit. Returns the cycles run.
    pub fn run(&mut self) -> u64 {
        let start = self.machine.clock;
        while !self.all_finished()
            && self.pending_input().is_none()
            && self.machine.clock < self.machine.config.max_cycles
        {
            self.advance_cycle();
        }

        self.machine.clock - start
    }

    pub fn set_policy(&mut self, policy: SchedulingAlgorithm) {
        self.sts.set_scheduling_alg(policy);
    }

    pub fn set_quantum(&mut self, quantum: usize) -> Result<(), KernelError> {
        self.sts.set_rr_quantum(quantum)
    }

    /// Resolves the oldest pending `assign x input` with `value`.
    pub fn supply_input(&mut self, value: &str) -> Result<Pid, KernelError> {
        let request = self
            .machine
            .input_requests
            .pop_front()
            .ok_or(KernelError::NoPendingInput)?;
        let pid = request.pid;
        let region = self.machine.processes.get(pid)?.get_region();

        match self.machine.memory.store_variable(pid, region, &request.variable, value) {
            Ok(_) => self.machine.record(format!(
                "PID {}: Assigned {} = {} (from input)",
                pid, request.variable, value
            )),
            Err(err) => self.machine.warn(err.to_string()),
        }

        let finished = self.machine.processes.update(pid, |pcb| {
            pcb.program_counter += 1;
            pcb.is_finished()
        })?;
        self.machine.sync_header(pid);

        if finished {
            self.machine.record(format!("PID {}: Finished", pid));
            self.machine.terminate(pid);
        }

        Ok(pid)
    }

    pub fn pending_input(&self) -> Option<(Pid, &str)> {
        self.machine
            .input_requests
            .front()
            .map(|request| (request.pid, request.variable.as_str()))
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(
            &self.machine,
            self.sts.scheduling_alg(),
            self.sts.rr_quantum(),
            self.lts.pending(),
        )
    }

    pub fn events(&self) -> &[String] {
        self.machine.events()
    }

    pub fn drain_events(&mut self) -> Vec<String> {
        self.machine.drain_events()
    }

    pub fn find(&self, pid: Pid) -> Result<usize, KernelError> {
        self.machine.processes.find(pid)
    }

    pub fn process_state(&self, pid: Pid) -> Option<ProcessState> {
        self.machine.state_of(pid)
    }

    pub fn all_finished(&self) -> bool {
        self.machine.processes.is_empty()
    }

    pub fn reset(&mut self) {
        let config = self.machine.config.clone();
        self.machine.reset();
        self.lts.clear();
        self.sts = ShortTermScheduler::new(config.policy, config.mlfq_quanta, config.rr_quantum);
        self.next_pid = 1;
        self.machine.record("Simulation reset");
    }
}

impl Default for Driver {
    fn default() -> Self {
        Driver::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::Resource;

    #[test]
    fn test_driver_load_program_arrives_immediately() {
        let mut driver = Driver::new();
        driver.load_program(&["print a"], 3).unwrap();

        let snapshot = driver.snapshot();
        assert_eq!(snapshot.ready_queues[0], vec![3]);
        assert_eq!(driver.find(3), Ok(0));
        assert_eq!(driver.find(4), Err(KernelError::NotFound(4)));
        assert_eq!(driver.process_state(3), Some(ProcessState::Ready));
        assert!(driver.events().contains(&"PID 3: Arrived".to_string()));
    }

    #[test]
    fn test_driver_load_program_errors() {
        let mut driver = Driver::new();
        assert_eq!(driver.load_program(&["print a"], 0), Err(KernelError::InvalidPid(0)));
        assert_eq!(driver.load_program(&["", "  "], 1), Err(KernelError::EmptyProgram));

        let long: Vec<String> = (0..60).map(|n| format!("print {}", n)).collect();
        assert_eq!(
            driver.load_program(&long, 1),
            Err(KernelError::OutOfMemory { needed: 69, available: 60 })
        );
        assert!(driver.all_finished());
    }

    #[test]
    fn test_driver_add_process_assigns_pids() {
        let mut driver = Driver::new();
        driver.load_program(&["print a"], 5).unwrap();
        assert_eq!(driver.add_process(&["print b"], 0), Ok(6));
        assert_eq!(driver.add_process(&["print c"], 0), Ok(7));
    }

    #[test]
    fn test_driver_delayed_arrival() {
        let mut driver = Driver::new();
        let pid = driver.add_process(&["print a"], 2).unwrap();
        assert_eq!(driver.snapshot().pending_arrivals, vec![pid]);

        driver.advance_cycle();
        driver.advance_cycle();
        assert!(!driver.snapshot().is_queued(pid));

        driver.advance_cycle();
        assert_eq!(driver.process_state(pid), Some(ProcessState::Terminated));
        assert_eq!(driver.clock(), 3);
    }

    #[test]
    fn test_driver_supply_input_completes_assign() {
        let mut driver = Driver::new();
        driver.load_program(&["assign x input", "print x"], 1).unwrap();
        driver.advance_cycle();
        assert_eq!(driver.pending_input(), Some((1, "x")));

        assert_eq!(driver.supply_input("42"), Ok(1));
        assert_eq!(driver.pending_input(), None);
        driver.advance_cycle();

        assert!(driver.events().contains(&"PID 1: Print x = 42".to_string()));
        assert_eq!(driver.process_state(1), Some(ProcessState::Terminated));
    }

    #[test]
    fn test_driver_supply_input_without_request() {
        let mut driver = Driver::new();
        assert_eq!(driver.supply_input("1"), Err(KernelError::NoPendingInput));
    }

    #[test]
    fn test_driver_supply_input_on_last_instruction_terminates() {
        let mut driver = Driver::new();
        driver.load_program(&["semWait userInput", "assign x input"], 1).unwrap();
        driver.advance_cycle();
        driver.advance_cycle();

        driver.supply_input("7").unwrap();
        assert_eq!(driver.process_state(1), Some(ProcessState::Terminated));
        assert_eq!(driver.snapshot().mutex(Resource::UserInput).map(|m| m.locked), Some(false));
    }

    #[test]
    fn test_driver_policy_change_applies_next_cycle() {
        let mut driver = Driver::new();
        driver.set_policy(SchedulingAlgorithm::Fcfs);
        assert_eq!(driver.snapshot().policy, SchedulingAlgorithm::Mlfq);

        driver.advance_cycle();
        assert_eq!(driver.snapshot().policy, SchedulingAlgorithm::Fcfs);
        assert!(driver.events().contains(&"FCFS Cycle 1".to_string()));
        assert_eq!(driver.set_quantum(0), Err(KernelError::InvalidQuantum(0)));
    }

    #[test]
    fn test_driver_run_stops_when_finished() {
        let mut driver = Driver::new();
        driver.add_process(&["print a", "print b"], 0).unwrap();
        assert_eq!(driver.run(), 2);
        assert!(driver.all_finished());
        assert!(driver.events().contains(&"PID 1: Finished".to_string()));
    }

    #[test]
    fn test_driver_reset() {
        let mut driver = Driver::new();
        driver.add_process(&["print a", "print b"], 0).unwrap();
        driver.advance_cycle();
        driver.reset();

        let snapshot = driver.snapshot();
        assert_eq!(snapshot.clock, 0);
        assert!(snapshot.processes.is_empty());
        assert_eq!(snapshot.available_memory, 60);
        assert_eq!(driver.add_process(&["print c"], 0), Ok(1));
    }

    #[test]
    fn test_driver_drain_events() {
        let mut driver = Driver::new();
        driver.add_process(&["print a"], 0).unwrap();
        assert!(!driver.drain_events().is_empty());
        assert!(driver.events().is_empty());
    }
}
