use serde::Serialize;

use super::{KernelError, Pid, ProcessControlBlock, ProcessState};

/// Slots taken by the header: pid, state, priority, pc, lower, upper.
pub const HEADER_WORDS: usize = 6;
pub const VARIABLE_WORDS: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Region {
    pub lower: usize,
    pub upper: usize,
}

impl Region {
    pub fn new(lower: usize, instruction_count: usize) -> Region {
        Region {
            lower,
            upper: lower + Region::span_for(instruction_count) - 1,
        }
    }

    pub fn span_for(instruction_count: usize) -> usize {
        HEADER_WORDS + instruction_count + VARIABLE_WORDS
    }

    pub fn len(&self) -> usize {
        self.upper - self.lower + 1
    }

    pub fn instructions_start(&self) -> usize {
        self.lower + HEADER_WORDS
    }

    pub fn instructions_end(&self) -> usize {
        self.upper + 1 - VARIABLE_WORDS
    }

    pub fn variables_start(&self) -> usize {
        self.instructions_end()
    }

    pub fn overlaps(&self, other: &Region) -> bool {
        self.lower <= other.upper && other.lower <= self.upper
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Variable {
    pub name: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum HeaderWord {
    Pid(Pid),
    State(ProcessState),
    Priority(usize),
    ProgramCounter(usize),
    LowerBound(usize),
    UpperBound(usize),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub enum Word {
    #[default]
    Free,
    Header(HeaderWord),
    Instruction(String),
    Variable(Option<Variable>),
}

pub(crate) struct Memory {
    data: Vec<Word>,
    current_data_idx: usize,
}

impl Memory {
    pub fn new(capacity: usize) -> Memory {
        Memory {
            data: vec![Word::Free; capacity],
            current_data_idx: 0,
        }
    }

    pub fn read_from(&self, address: usize) -> &Word {
        if address >= self.data.len() {
            panic!("Out of bounds memory access. Address is greater than memory size");
        }

        &self.data[address]
    }

    pub fn write_to(&mut self, address: usize, word: Word) {
        if address >= self.data.len() {
            panic!("Out of bounds memory access");
        }

        self.data[address] = word;
    }

    pub fn write_block_to(&mut self, address: usize, words: Vec<Word>) {
        let end_address = address + words.len();

        if end_address > self.data.len() {
            panic!("Out of bounds memory access");
        }

        for (offset, word) in words.into_iter().enumerate() {
            self.data[address + offset] = word;
        }
    }

    pub fn words(&self) -> &[Word] {
        &self.data
    }

    pub fn allocate(&mut self, pid: Pid, instruction_count: usize) -> Result<Region, KernelError> {
        let needed = Region::span_for(instruction_count);
        let available = self.get_remaining_memory();
        if needed > available {
            return Err(KernelError::OutOfMemory { needed, available });
        }

        let region = Region::new(self.current_data_idx, instruction_count);
        self.current_data_idx = region.upper + 1;

        let pcb = ProcessControlBlock::new(pid, region, 0);
        self.write_header(&pcb);
        for address in region.variables_start()..=region.upper {
            self.data[address] = Word::Variable(None);
        }

        log::debug!("allocated [{}, {}] for PID {}", region.lower, region.upper, pid);
        Ok(region)
    }

    pub fn reclaim(&mut self, region: Region) {
        for address in region.lower..=region.upper {
            self.write_to(address, Word::Free);
        }

        while self.current_data_idx > 0 && self.data[self.current_data_idx - 1] == Word::Free {
            self.current_data_idx -= 1;
        }

        log::debug!(
            "reclaimed [{}, {}], allocation cursor at {}",
            region.lower,
            region.upper,
            self.current_data_idx
        );
    }

    pub fn write_header(&mut self, pcb: &ProcessControlBlock) {
        let start = pcb.get_mem_start_address();
        self.write_block_to(
            start,
            vec![
                Word::Header(HeaderWord::Pid(pcb.get_id())),
                Word::Header(HeaderWord::State(pcb.state)),
                Word::Header(HeaderWord::Priority(pcb.priority)),
                Word::Header(HeaderWord::ProgramCounter(pcb.program_counter)),
                Word::Header(HeaderWord::LowerBound(pcb.get_mem_start_address())),
                Word::Header(HeaderWord::UpperBound(pcb.get_mem_end_address())),
            ],
        );
    }

    pub fn instruction_at(&self, address: usize) -> Option<&str> {
        match self.read_from(address) {
            Word::Instruction(line) => Some(line),
            _ => None,
        }
    }

    pub fn variable(&self, region: Region, name: &str) -> Option<&Variable> {
        (region.variables_start()..=region.upper).find_map(|address| match &self.data[address] {
            Word::Variable(Some(variable)) if variable.name == name => Some(variable),
            _ => None,
        })
    }

    pub fn store_variable(
        &mut self,
        pid: Pid,
        region: Region,
        name: &str,
        value: &str,
    ) -> Result<usize, KernelError> {
        let slots = region.variables_start()..=region.upper;

        let existing = slots.clone().find(|&address| {
            matches!(&self.data[address], Word::Variable(Some(variable)) if variable.name == name)
        });
        let address = existing
            .or_else(|| slots.clone().find(|&address| self.data[address] == Word::Variable(None)))
            .ok_or_else(|| KernelError::VariableSlotsFull {
                pid,
                name: name.to_string(),
            })?;

        self.data[address] = Word::Variable(Some(Variable {
            name: name.to_string(),
            value: value.to_string(),
        }));

        Ok(address)
    }

    pub fn get_remaining_memory(&self) -> usize {
        self.data.len() - self.current_data_idx
    }

    pub fn free_words(&self) -> usize {
        self.data.iter().filter(|word| **word == Word::Free).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(memory: &mut Memory, pid: Pid, lines: &[&str]) -> Region {
        let region = memory.allocate(pid, lines.len()).unwrap();
        let words = lines.iter().map(|line| Word::Instruction(line.to_string())).collect();
        memory.write_block_to(region.instructions_start(), words);
        region
    }

    #[test]
    fn test_memory_read_from() {
        let memory = Memory::new(60);
        assert_eq!(memory.read_from(0), &Word::Free);
    }

    #[test]
    #[should_panic]
    fn test_memory_out_of_bounds_read_from() {
        let memory = Memory::new(60);
        memory.read_from(60);
    }

    #[test]
    fn test_memory_write_to() {
        let mut memory = Memory::new(60);
        memory.write_to(0, Word::Instruction("print x".to_string()));
        assert_eq!(memory.instruction_at(0), Some("print x"));
    }

    #[test]
    #[should_panic]
    fn test_memory_out_of_bounds_write_to() {
        let mut memory = Memory::new(60);
        memory.write_to(60, Word::Free);
    }

    #[test]
    #[should_panic]
    fn test_memory_out_of_bounds_write_block_to() {
        let mut memory = Memory::new(10);
        memory.write_block_to(8, vec![Word::Free; 5]);
    }

    #[test]
    fn test_memory_allocate_lays_out_header_and_variables() {
        let mut memory = Memory::new(60);
        let region = load(&mut memory, 7, &["assign x 5", "print x"]);

        assert_eq!(region, Region { lower: 0, upper: 10 });
        assert_eq!(memory.read_from(0), &Word::Header(HeaderWord::Pid(7)));
        assert_eq!(memory.read_from(3), &Word::Header(HeaderWord::ProgramCounter(6)));
        assert_eq!(memory.read_from(5), &Word::Header(HeaderWord::UpperBound(10)));
        assert_eq!(memory.instruction_at(6), Some("assign x 5"));
        assert_eq!(memory.instruction_at(7), Some("print x"));
        assert_eq!(memory.read_from(8), &Word::Variable(None));
        assert_eq!(memory.read_from(10), &Word::Variable(None));
        assert_eq!(memory.get_remaining_memory(), 49);
    }

    #[test]
    fn test_memory_allocate_out_of_memory() {
        let mut memory = Memory::new(12);
        let result = memory.allocate(1, 4);
        assert_eq!(result, Err(KernelError::OutOfMemory { needed: 13, available: 12 }));
        assert_eq!(memory.get_remaining_memory(), 12);
    }

    #[test]
    fn test_memory_regions_are_disjoint() {
        let mut memory = Memory::new(60);
        let first = load(&mut memory, 1, &["print a", "print b"]);
        let second = load(&mut memory, 2, &["print c"]);
        assert!(!first.overlaps(&second));
        assert_eq!(second.lower, first.upper + 1);
    }

    #[test]
    fn test_memory_reclaim_top_region_retracts_cursor() {
        let mut memory = Memory::new(60);
        let first = load(&mut memory, 1, &["print a"]);
        let second = load(&mut memory, 2, &["print b"]);

        memory.reclaim(second);
        assert_eq!(memory.get_remaining_memory(), 60 - first.len());
        assert!(memory.words()[second.lower..=second.upper].iter().all(|w| *w == Word::Free));
    }

    #[test]
    fn test_memory_reclaim_hole_is_not_reused() {
        let mut memory = Memory::new(60);
        let first = load(&mut memory, 1, &["print a"]);
        let second = load(&mut memory, 2, &["print b"]);

        memory.reclaim(first);
        assert_eq!(memory.get_remaining_memory(), 60 - first.len() - second.len());
        assert_eq!(memory.free_words(), 60 - second.len());

        let third = load(&mut memory, 3, &["print c"]);
        assert_eq!(third.lower, second.upper + 1);

        // Freeing the top now swallows the hole below it as well.
        memory.reclaim(third);
        memory.reclaim(second);
        assert_eq!(memory.get_remaining_memory(), 60);
    }

    #[test]
    fn test_memory_store_and_overwrite_variable() {
        let mut memory = Memory::new(60);
        let region = load(&mut memory, 1, &["assign x 1"]);

        let slot = memory.store_variable(1, region, "x", "1").unwrap();
        assert_eq!(memory.store_variable(1, region, "x", "2").unwrap(), slot);
        assert_eq!(memory.variable(region, "x").unwrap().value, "2");
        assert!(memory.variable(region, "y").is_none());
    }

    #[test]
    fn test_memory_variable_slots_full() {
        let mut memory = Memory::new(60);
        let region = load(&mut memory, 1, &["assign a 1"]);

        for name in ["a", "b", "c"] {
            memory.store_variable(1, region, name, "1").unwrap();
        }
        let result = memory.store_variable(1, region, "d", "1");
        assert_eq!(
            result,
            Err(KernelError::VariableSlotsFull { pid: 1, name: "d".to_string() })
        );
    }
}
