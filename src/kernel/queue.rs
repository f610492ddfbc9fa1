use std::collections::VecDeque;

use super::{KernelError, Pid};

#[derive(Clone, Debug)]
pub(crate) struct ProcessQueue {
    items: VecDeque<Pid>,
    capacity: usize,
}

impl ProcessQueue {
    pub fn new(capacity: usize) -> ProcessQueue {
        ProcessQueue {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn enqueue(&mut self, pid: Pid) -> Result<(), KernelError> {
        if self.items.contains(&pid) {
            log::debug!("PID {} already in queue, skipping enqueue", pid);
            return Ok(());
        }
        if self.is_full() {
            return Err(KernelError::QueueFull {
                pid,
                capacity: self.capacity,
            });
        }

        self.items.push_back(pid);
        Ok(())
    }

    pub fn remove(&mut self, pid: Pid) -> bool {
        match self.items.iter().position(|&queued| queued == pid) {
            Some(index) => {
                self.items.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn retain(&mut self, keep: impl FnMut(&Pid) -> bool) {
        self.items.retain(keep);
    }

    pub fn remove_highest_priority(&mut self, priority_of: impl Fn(Pid) -> usize) -> Option<Pid> {
        let mut best: Option<(usize, usize)> = None;
        for (index, &pid) in self.items.iter().enumerate() {
            let priority = priority_of(pid);
            if best.map_or(true, |(_, best_priority)| priority < best_priority) {
                best = Some((index, priority));
            }
        }

        best.and_then(|(index, _)| self.items.remove(index))
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.items.contains(&pid)
    }

    pub fn iter(&self) -> impl Iterator<Item = Pid> + '_ {
        self.items.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<Pid> {
        self.items.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

pub(crate) struct ReadyQueues {
    levels: Vec<ProcessQueue>,
    active_levels: usize,
}

impl ReadyQueues {
    pub fn new(levels: usize, capacity: usize) -> ReadyQueues {
        ReadyQueues {
            levels: (0..levels).map(|_| ProcessQueue::new(capacity)).collect(),
            active_levels: levels,
        }
    }

    pub fn active_levels(&self) -> usize {
        self.active_levels
    }

    pub fn level(&self, level: usize) -> &ProcessQueue {
        &self.levels[level]
    }

    pub fn level_mut(&mut self, level: usize) -> &mut ProcessQueue {
        &mut self.levels[level]
    }

    pub fn level_for(&self, priority: usize) -> usize {
        priority.min(self.active_levels - 1)
    }

    /// Appends `pid` to the level matching `priority`. Returns the level.
    /// A full target level leaves the pid where it was.
    pub fn enqueue(&mut self, pid: Pid, priority: usize) -> Result<usize, KernelError> {
        let level = self.level_for(priority);
        let target = &self.levels[level];
        if target.is_full() && !target.contains(pid) {
            return Err(KernelError::QueueFull {
                pid,
                capacity: target.capacity,
            });
        }

        self.remove(pid);
        self.levels[level].enqueue(pid)?;
        Ok(level)
    }

    pub fn remove(&mut self, pid: Pid) -> bool {
        self.levels.iter_mut().fold(false, |removed, queue| queue.remove(pid) || removed)
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.levels.iter().any(|queue| queue.contains(pid))
    }

    pub fn rebalance(&mut self, active_levels: usize, priority_of: impl Fn(Pid) -> usize) {
        self.active_levels = active_levels.clamp(1, self.levels.len());

        for level in 0..self.levels.len() {
            for pid in self.levels[level].to_vec() {
                let target = self.level_for(priority_of(pid));
                if target == level {
                    continue;
                }

                // Collapsing several levels into one can overflow it.
                let destination = (target..self.active_levels)
                    .chain(0..target)
                    .find(|&candidate| candidate == level || !self.levels[candidate].is_full());
                match destination {
                    Some(destination) if destination != level => {
                        self.levels[level].remove(pid);
                        self.levels[destination].items.push_back(pid);
                        if destination != target {
                            log::warn!("Queue {} full, PID {} placed in Queue {}", target, pid, destination);
                        }
                    }
                    _ => log::warn!("Queue {} full, PID {} left in Queue {}", target, pid, level),
                }
            }
        }
    }

    pub fn to_vecs(&self) -> Vec<Vec<Pid>> {
        self.levels[..self.active_levels].iter().map(ProcessQueue::to_vec).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_fifo_order() {
        let mut queue = ProcessQueue::new(4);
        queue.enqueue(1).unwrap();
        queue.enqueue(2).unwrap();
        queue.enqueue(3).unwrap();
        assert_eq!(queue.iter().next(), Some(1));
        assert_eq!(queue.to_vec(), vec![1, 2, 3]);
    }

    #[test]
    fn test_queue_full_refuses_pid() {
        let mut queue = ProcessQueue::new(2);
        queue.enqueue(1).unwrap();
        queue.enqueue(2).unwrap();
        assert_eq!(queue.enqueue(3), Err(KernelError::QueueFull { pid: 3, capacity: 2 }));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_queue_duplicate_is_ignored() {
        let mut queue = ProcessQueue::new(4);
        queue.enqueue(5).unwrap();
        queue.enqueue(5).unwrap();
        assert_eq!(queue.to_vec(), vec![5]);
    }

    #[test]
    fn test_queue_remove_middle() {
        let mut queue = ProcessQueue::new(4);
        for pid in [1, 2, 3] {
            queue.enqueue(pid).unwrap();
        }
        assert!(queue.remove(2));
        assert!(!queue.remove(2));
        assert_eq!(queue.to_vec(), vec![1, 3]);
    }

    #[test]
    fn test_queue_remove_highest_priority_ties_keep_order() {
        let mut queue = ProcessQueue::new(8);
        for pid in [4, 7, 9, 2] {
            queue.enqueue(pid).unwrap();
        }
        let priority = |pid: Pid| match pid {
            4 => 2,
            7 => 1,
            9 => 1,
            _ => 3,
        };
        assert_eq!(queue.remove_highest_priority(priority), Some(7));
        assert_eq!(queue.remove_highest_priority(priority), Some(9));
        assert_eq!(queue.remove_highest_priority(priority), Some(4));
        assert_eq!(queue.to_vec(), vec![2]);
    }

    #[test]
    fn test_ready_queues_enqueue_moves_between_levels() {
        let mut ready = ReadyQueues::new(4, 10);
        assert_eq!(ready.enqueue(1, 0), Ok(0));
        assert_eq!(ready.enqueue(1, 2), Ok(2));
        assert!(!ready.level(0).contains(1));
        assert!(ready.level(2).contains(1));
        assert_eq!(ready.to_vecs().concat(), vec![1]);
    }

    #[test]
    fn test_ready_queues_full_level_keeps_current_slot() {
        let mut ready = ReadyQueues::new(4, 1);
        ready.enqueue(1, 0).unwrap();
        ready.enqueue(2, 1).unwrap();

        assert_eq!(ready.enqueue(2, 0), Err(KernelError::QueueFull { pid: 2, capacity: 1 }));
        assert_eq!(ready.to_vecs(), vec![vec![1], vec![2], vec![], vec![]]);
        assert_eq!(ready.enqueue(1, 0), Ok(0));
    }

    #[test]
    fn test_ready_queues_rebalance_overflow_keeps_pid_queued() {
        let mut ready = ReadyQueues::new(4, 2);
        ready.enqueue(1, 0).unwrap();
        ready.enqueue(2, 0).unwrap();
        ready.enqueue(3, 1).unwrap();
        ready.enqueue(4, 2).unwrap();

        ready.rebalance(2, |_| 0);
        assert_eq!(ready.to_vecs(), vec![vec![1, 2], vec![3, 4]]);
    }

    #[test]
    fn test_ready_queues_rebalance_to_single_level() {
        let mut ready = ReadyQueues::new(4, 10);
        ready.enqueue(1, 2).unwrap();
        ready.enqueue(2, 0).unwrap();
        ready.enqueue(3, 3).unwrap();

        let priorities = |pid: Pid| match pid {
            1 => 2,
            3 => 3,
            _ => 0,
        };
        ready.rebalance(1, priorities);
        assert_eq!(ready.to_vecs(), vec![vec![2, 1, 3]]);
        assert_eq!(ready.enqueue(4, 3), Ok(0));

        ready.rebalance(4, priorities);
        assert_eq!(ready.to_vecs(), vec![vec![2, 4], vec![], vec![1], vec![3]]);
    }
}
