use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::queue::ProcessQueue;
use super::{KernelError, Pid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Resource {
    UserInput,
    File,
    UserOutput,
}

impl Resource {
    pub const ALL: [Resource; 3] = [Resource::UserInput, Resource::File, Resource::UserOutput];

    fn index(self) -> usize {
        match self {
            Resource::UserInput => 0,
            Resource::File => 1,
            Resource::UserOutput => 2,
        }
    }
}

impl FromStr for Resource {
    type Err = KernelError;

    fn from_str(name: &str) -> Result<Resource, KernelError> {
        match name {
            "userInput" => Ok(Resource::UserInput),
            "file" => Ok(Resource::File),
            "userOutput" => Ok(Resource::UserOutput),
            _ => Err(KernelError::UnknownResource(name.to_string())),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::UserInput => "userInput",
            Resource::File => "file",
            Resource::UserOutput => "userOutput",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    Acquired,
    AlreadyOwned,
    Blocked,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalOutcome {
    Released,
    HandedOff(Pid),
    NotLocked,
    NotOwner { owner: Pid },
}

#[derive(Clone, Debug)]
pub(crate) struct Mutex {
    resource: Resource,
    locked: bool,
    owner: Option<Pid>,
    waiters: ProcessQueue,
}

impl Mutex {
    pub fn new(resource: Resource, queue_capacity: usize) -> Mutex {
        Mutex {
            resource,
            locked: false,
            owner: None,
            waiters: ProcessQueue::new(queue_capacity),
        }
    }

    pub fn resource(&self) -> Resource {
        self.resource
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn owner(&self) -> Option<Pid> {
        self.owner
    }

    pub fn waiters(&self) -> &ProcessQueue {
        &self.waiters
    }

    pub fn wait(&mut self, pid: Pid) -> Result<WaitOutcome, KernelError> {
        match self.owner {
            Some(owner) if owner == pid => Ok(WaitOutcome::AlreadyOwned),
            Some(_) => {
                self.waiters.enqueue(pid)?;
                Ok(WaitOutcome::Blocked)
            }
            None => {
                self.locked = true;
                self.owner = Some(pid);
                Ok(WaitOutcome::Acquired)
            }
        }
    }

    pub fn signal(&mut self, pid: Pid, priority_of: impl Fn(Pid) -> Option<usize>) -> SignalOutcome {
        let owner = match self.owner {
            None => return SignalOutcome::NotLocked,
            Some(owner) if owner != pid => return SignalOutcome::NotOwner { owner },
            Some(owner) => owner,
        };

        let resource = self.resource;
        self.waiters.retain(|&waiter| {
            let alive = priority_of(waiter).is_some();
            if !alive {
                log::warn!("PCB not found for waiter PID {} on {}, discarding", waiter, resource);
            }
            alive
        });

        let next = self
            .waiters
            .remove_highest_priority(|waiter| priority_of(waiter).unwrap_or(usize::MAX));
        match next {
            Some(next) => {
                log::debug!("{} handed from PID {} to PID {}", resource, owner, next);
                self.owner = Some(next);
                SignalOutcome::HandedOff(next)
            }
            None => {
                self.locked = false;
                self.owner = None;
                SignalOutcome::Released
            }
        }
    }

    pub fn pop_highest_priority_waiter(&mut self, priority_of: impl Fn(Pid) -> usize) -> Option<Pid> {
        self.waiters.remove_highest_priority(priority_of)
    }

    pub fn remove_waiter(&mut self, pid: Pid) -> bool {
        self.waiters.remove(pid)
    }
}

pub(crate) struct MutexSet {
    mutexes: [Mutex; 3],
}

impl MutexSet {
    pub fn new(queue_capacity: usize) -> MutexSet {
        MutexSet {
            mutexes: Resource::ALL.map(|resource| Mutex::new(resource, queue_capacity)),
        }
    }

    pub fn get(&self, resource: Resource) -> &Mutex {
        &self.mutexes[resource.index()]
    }

    pub fn get_mut(&mut self, resource: Resource) -> &mut Mutex {
        &mut self.mutexes[resource.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mutex> {
        self.mutexes.iter()
    }

    pub fn owned_by(&self, pid: Pid) -> Vec<Resource> {
        self.mutexes
            .iter()
            .filter(|mutex| mutex.owner() == Some(pid))
            .map(Mutex::resource)
            .collect()
    }

    pub fn waiting_on(&self, pid: Pid) -> Option<Resource> {
        self.mutexes
            .iter()
            .find(|mutex| mutex.waiters().contains(pid))
            .map(Mutex::resource)
    }

    pub fn remove_waiter(&mut self, pid: Pid) -> bool {
        self.mutexes.iter_mut().fold(false, |removed, mutex| mutex.remove_waiter(pid) || removed)
    }

    pub fn blocked_pids(&self) -> Vec<Pid> {
        self.mutexes.iter().flat_map(|mutex| mutex.waiters().to_vec()).collect()
    }

    pub fn total_waiters(&self) -> usize {
        self.mutexes.iter().map(|mutex| mutex.waiters().len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn priorities(pid: Pid) -> Option<usize> {
        match pid {
            1 => Some(0),
            2 => Some(2),
            3 => Some(1),
            4 => Some(1),
            _ => None,
        }
    }

    #[test]
    fn test_mutex_acquire_when_free() {
        let mut mutex = Mutex::new(Resource::File, 10);
        assert_eq!(mutex.wait(1), Ok(WaitOutcome::Acquired));
        assert!(mutex.is_locked());
        assert_eq!(mutex.owner(), Some(1));
    }

    #[test]
    fn test_mutex_reentrant_wait() {
        let mut mutex = Mutex::new(Resource::File, 10);
        mutex.wait(1).unwrap();
        assert_eq!(mutex.wait(1), Ok(WaitOutcome::AlreadyOwned));
        assert!(mutex.waiters().to_vec().is_empty());
    }

    #[test]
    fn test_mutex_busy_blocks() {
        let mut mutex = Mutex::new(Resource::File, 10);
        mutex.wait(1).unwrap();
        assert_eq!(mutex.wait(2), Ok(WaitOutcome::Blocked));
        assert_eq!(mutex.waiters().to_vec(), vec![2]);
        assert_eq!(mutex.owner(), Some(1));
    }

    #[test]
    fn test_mutex_signal_without_waiters_releases() {
        let mut mutex = Mutex::new(Resource::UserOutput, 10);
        mutex.wait(1).unwrap();
        assert_eq!(mutex.signal(1, priorities), SignalOutcome::Released);
        assert!(!mutex.is_locked());
        assert_eq!(mutex.owner(), None);
    }

    #[test]
    fn test_mutex_signal_hands_off_to_highest_priority() {
        let mut mutex = Mutex::new(Resource::File, 10);
        mutex.wait(1).unwrap();
        for pid in [2, 3, 4] {
            mutex.wait(pid).unwrap();
        }

        assert_eq!(mutex.signal(1, priorities), SignalOutcome::HandedOff(3));
        assert!(mutex.is_locked());
        assert_eq!(mutex.owner(), Some(3));
        assert_eq!(mutex.signal(3, priorities), SignalOutcome::HandedOff(4));
        assert_eq!(mutex.signal(4, priorities), SignalOutcome::HandedOff(2));
        assert_eq!(mutex.signal(2, priorities), SignalOutcome::Released);
    }

    #[test]
    fn test_mutex_signal_discards_vanished_waiters() {
        let mut mutex = Mutex::new(Resource::File, 10);
        mutex.wait(1).unwrap();
        mutex.wait(9).unwrap();
        assert_eq!(mutex.signal(1, priorities), SignalOutcome::Released);
        assert!(mutex.waiters().to_vec().is_empty());
    }

    #[test]
    fn test_mutex_signal_by_non_owner_is_ignored() {
        let mut mutex = Mutex::new(Resource::File, 10);
        assert_eq!(mutex.signal(1, priorities), SignalOutcome::NotLocked);
        mutex.wait(1).unwrap();
        assert_eq!(mutex.signal(2, priorities), SignalOutcome::NotOwner { owner: 1 });
        assert_eq!(mutex.owner(), Some(1));
    }

    #[test]
    fn test_mutex_set_lookup_and_blocked_view() {
        let mut mutexes = MutexSet::new(10);
        mutexes.get_mut(Resource::File).wait(1).unwrap();
        mutexes.get_mut(Resource::UserInput).wait(1).unwrap();
        mutexes.get_mut(Resource::File).wait(2).unwrap();
        mutexes.get_mut(Resource::UserInput).wait(3).unwrap();

        assert_eq!(mutexes.owned_by(1), vec![Resource::UserInput, Resource::File]);
        assert_eq!(mutexes.waiting_on(2), Some(Resource::File));
        assert_eq!(mutexes.blocked_pids(), vec![3, 2]);
        assert_eq!(mutexes.total_waiters(), 2);

        assert!(mutexes.remove_waiter(2));
        assert_eq!(mutexes.waiting_on(2), None);
    }

    #[test]
    fn test_resource_from_str() {
        assert_eq!("file".parse::<Resource>(), Ok(Resource::File));
        assert_eq!("userInput".parse::<Resource>(), Ok(Resource::UserInput));
        assert_eq!(
            "printer".parse::<Resource>(),
            Err(KernelError::UnknownResource("printer".to_string()))
        );
    }
}
