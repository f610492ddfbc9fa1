use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::cpu::{Cpu, Interrupt};
use super::machine::Machine;
use super::{KernelError, Pid, ProcessState, MLFQ_LEVELS};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulingAlgorithm {
    #[serde(rename = "mlfq")]
    Mlfq,
    #[serde(rename = "rr")]
    RoundRobin,
    #[serde(rename = "fcfs")]
    Fcfs,
}

impl SchedulingAlgorithm {
    pub fn levels(self) -> usize {
        match self {
            SchedulingAlgorithm::Mlfq => MLFQ_LEVELS,
            SchedulingAlgorithm::RoundRobin | SchedulingAlgorithm::Fcfs => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SchedulingAlgorithm::Mlfq => "MLFQ",
            SchedulingAlgorithm::RoundRobin => "RR",
            SchedulingAlgorithm::Fcfs => "FCFS",
        }
    }
}

impl FromStr for SchedulingAlgorithm {
    type Err = KernelError;

    fn from_str(name: &str) -> Result<SchedulingAlgorithm, KernelError> {
        match name.to_ascii_lowercase().as_str() {
            "mlfq" => Ok(SchedulingAlgorithm::Mlfq),
            "rr" => Ok(SchedulingAlgorithm::RoundRobin),
            "fcfs" => Ok(SchedulingAlgorithm::Fcfs),
            _ => Err(KernelError::UnknownPolicy(name.to_string())),
        }
    }
}

impl fmt::Display for SchedulingAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct CycleReport {
    pub executed: Option<Pid>,
    pub advanced: bool,
}

impl CycleReport {
    fn idle() -> CycleReport {
        CycleReport {
            executed: None,
            advanced: false,
        }
    }
}

pub(crate) struct ShortTermScheduler {
    scheduling_alg: SchedulingAlgorithm,
    pending_alg: Option<SchedulingAlgorithm>,
    mlfq_quanta: [usize; MLFQ_LEVELS],
    rr_quantum: usize,
    pending_rr_quantum: Option<usize>,
    /// Instructions left in the current round robin slice. Shared by every
    /// process and only reset when a slice expires.
    rr_remaining: usize,
}

impl ShortTermScheduler {
    pub fn new(scheduling_alg: SchedulingAlgorithm, mlfq_quanta: [usize; MLFQ_LEVELS], rr_quantum: usize) -> ShortTermScheduler {
        ShortTermScheduler {
            scheduling_alg,
            pending_alg: None,
            mlfq_quanta,
            rr_quantum,
            pending_rr_quantum: None,
            rr_remaining: rr_quantum,
        }
    }

    pub fn scheduling_alg(&self) -> SchedulingAlgorithm {
        self.scheduling_alg
    }

    pub fn rr_quantum(&self) -> usize {
        self.rr_quantum
    }

    pub fn set_scheduling_alg(&mut self, scheduling_alg: SchedulingAlgorithm) {
        self.pending_alg = Some(scheduling_alg);
    }

    pub fn set_rr_quantum(&mut self, quantum: usize) -> Result<(), KernelError> {
        if quantum == 0 {
            return Err(KernelError::InvalidQuantum(quantum));
        }

        self.pending_rr_quantum = Some(quantum);
        Ok(())
    }

    pub fn apply_pending(&mut self, machine: &mut Machine) {
        if let Some(quantum) = self.pending_rr_quantum.take() {
            self.rr_quantum = quantum;
            self.rr_remaining = quantum;
            machine.record(format!("RR quantum set to {}", quantum));
        }

        let Some(scheduling_alg) = self.pending_alg.take() else {
            return;
        };
        if scheduling_alg == self.scheduling_alg {
            return;
        }

        self.scheduling_alg = scheduling_alg;
        self.rr_remaining = self.rr_quantum;
        let processes = &machine.processes;
        machine.ready.rebalance(scheduling_alg.levels(), |pid| {
            processes.get(pid).map_or(0, |pcb| pcb.priority)
        });
        machine.record(format!("Scheduler switched to {}", scheduling_alg));
    }

    pub fn run_cycle(&mut self, machine: &mut Machine) -> CycleReport {
        let Some((level, pid)) = ShortTermScheduler::select(machine) else {
            machine.running = None;
            return CycleReport::idle();
        };

        if let Some(previous) = machine.running.filter(|&previous| previous != pid) {
            if machine.state_of(previous) == Some(ProcessState::Running) {
                let _ = machine.set_state(previous, ProcessState::Ready);
            }
        }
        if let Err(err) = machine.set_state(pid, ProcessState::Running) {
            machine.warn(err.to_string());
            return CycleReport::idle();
        }
        machine.running = Some(pid);

        let interrupt = match Cpu::step(machine, pid) {
            Ok(interrupt) => interrupt,
            Err(err) => {
                machine.warn(format!("PID {}: {}", pid, err));
                machine.running = None;
                return CycleReport::idle();
            }
        };

        let finished = machine.processes.get(pid).map_or(true, |pcb| pcb.is_finished());
        let advanced = interrupt != Interrupt::Stalled;
        match interrupt {
            Interrupt::Completed | Interrupt::Exited if finished => {
                machine.record(format!("PID {}: Finished", pid));
                machine.terminate(pid);
            }
            Interrupt::Completed => self.after_instruction(machine, pid, level),
            Interrupt::Blocked(_) => {
                let _ = machine.processes.update(pid, |pcb| pcb.level_ticks = 0);
            }
            Interrupt::AwaitingInput | Interrupt::Stalled | Interrupt::Exited => {
                let _ = machine.set_state(pid, ProcessState::Ready);
                machine.running = None;
            }
        }

        CycleReport {
            executed: Some(pid),
            advanced,
        }
    }

    fn select(machine: &mut Machine) -> Option<(usize, Pid)> {
        for level in 0..machine.ready.active_levels() {
            let mut index = 0;
            for _ in 0..machine.ready.level(level).len() {
                let Some(pid) = machine.ready.level(level).iter().nth(index) else {
                    break;
                };

                match machine.processes.get(pid).map(|pcb| pcb.state) {
                    Err(_) => {
                        machine.warn(format!("PCB not found for PID {}, discarding", pid));
                        machine.ready.level_mut(level).remove(pid);
                    }
                    Ok(ProcessState::Blocked) | Ok(ProcessState::Terminated) => {
                        machine.warn(format!("PID {}: not runnable, removing from Queue {}", pid, level));
                        machine.ready.level_mut(level).remove(pid);
                    }
                    Ok(_) if machine.is_awaiting_input(pid) => index += 1,
                    Ok(_) => return Some((level, pid)),
                }
            }
        }

        None
    }

    fn after_instruction(&mut self, machine: &mut Machine, pid: Pid, level: usize) {
        match self.scheduling_alg {
            SchedulingAlgorithm::Mlfq => self.after_mlfq_instruction(machine, pid, level),
            SchedulingAlgorithm::RoundRobin => {
                if self.rr_remaining <= 1 {
                    self.rr_remaining = self.rr_quantum;
                    machine.record(format!("Re-enqueuing PID {} after quantum", pid));
                    ShortTermScheduler::requeue(machine, pid);
                } else {
                    self.rr_remaining -= 1;
                }
            }
            SchedulingAlgorithm::Fcfs => {}
        }
    }

    fn after_mlfq_instruction(&self, machine: &mut Machine, pid: Pid, level: usize) {
        let quantum = self.mlfq_quanta[level.min(MLFQ_LEVELS - 1)];
        let ticks = machine
            .processes
            .update(pid, |pcb| {
                pcb.level_ticks += 1;
                pcb.level_ticks
            })
            .unwrap_or(0);
        if ticks < quantum {
            return;
        }

        let next_level = (level + 1).min(MLFQ_LEVELS - 1);
        let _ = machine.processes.update(pid, |pcb| {
            pcb.level_ticks = 0;
            pcb.priority = next_level;
        });
        if next_level != level {
            machine.record(format!("Demoting PID {} to Queue {}", pid, next_level));
        } else {
            machine.record(format!("PID {}: Quantum expired, requeued in Queue {}", pid, level));
        }
        ShortTermScheduler::requeue(machine, pid);
    }

    fn requeue(machine: &mut Machine, pid: Pid) {
        if let Err(err) = machine.make_ready(pid) {
            machine.warn(err.to_string());
        }
        if machine.running == Some(pid) {
            machine.running = None;
        }
    }
}
