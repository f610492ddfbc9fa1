use std::collections::BTreeMap;

use super::{KernelError, Pid, ProcessControlBlock};

pub(crate) struct ProcessTable {
    pcb_map: BTreeMap<Pid, ProcessControlBlock>,
}

impl ProcessTable {
    pub fn new() -> ProcessTable {
        ProcessTable {
            pcb_map: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, pcb: ProcessControlBlock) -> Result<(), KernelError> {
        let pid = pcb.get_id();
        if pid == 0 || self.pcb_map.contains_key(&pid) {
            return Err(KernelError::InvalidPid(pid));
        }

        self.pcb_map.insert(pid, pcb);
        Ok(())
    }

    pub fn find(&self, pid: Pid) -> Result<usize, KernelError> {
        self.get(pid).map(ProcessControlBlock::get_mem_start_address)
    }

    pub fn get(&self, pid: Pid) -> Result<&ProcessControlBlock, KernelError> {
        self.pcb_map.get(&pid).ok_or(KernelError::NotFound(pid))
    }

    pub fn update<R>(
        &mut self,
        pid: Pid,
        mutator: impl FnOnce(&mut ProcessControlBlock) -> R,
    ) -> Result<R, KernelError> {
        let pcb = self.pcb_map.get_mut(&pid).ok_or(KernelError::NotFound(pid))?;
        Ok(mutator(pcb))
    }

    pub fn remove(&mut self, pid: Pid) -> Result<ProcessControlBlock, KernelError> {
        self.pcb_map.remove(&pid).ok_or(KernelError::NotFound(pid))
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.pcb_map.contains_key(&pid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessControlBlock> {
        self.pcb_map.values()
    }

    pub fn is_empty(&self) -> bool {
        self.pcb_map.is_empty()
    }
}
