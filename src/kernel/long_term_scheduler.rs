use std::collections::VecDeque;

use super::Pid;

pub(crate) struct LongTermScheduler {
    program_queue: VecDeque<(Pid, u64)>,
}

impl LongTermScheduler {
    pub fn new() -> LongTermScheduler {
        LongTermScheduler {
            program_queue: VecDeque::new(),
        }
    }

    pub fn schedule_arrival(&mut self, pid: Pid, arrival_time: u64) {
        let index = self
            .program_queue
            .iter()
            .position(|&(_, queued_arrival)| queued_arrival > arrival_time)
            .unwrap_or(self.program_queue.len());
        self.program_queue.insert(index, (pid, arrival_time));
    }

    pub fn step(&mut self, clock: u64) -> Option<Pid> {
        match self.program_queue.front() {
            Some(&(pid, arrival_time)) if arrival_time <= clock => {
                self.program_queue.pop_front();
                Some(pid)
            }
            _ => None,
        }
    }

    pub fn batch_step(&mut self, clock: u64) -> Vec<Pid> {
        let mut process_ids = Vec::new();

        while let Some(process_id) = self.step(clock) {
            process_ids.push(process_id);
        }

        process_ids
    }

    pub fn pending(&self) -> Vec<Pid> {
        self.program_queue.iter().map(|&(pid, _)| pid).collect()
    }

    pub fn clear(&mut self) {
        self.program_queue.clear();
    }
}
