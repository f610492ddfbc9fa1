use std::fmt;
use std::fs;
use std::str::FromStr;

use super::machine::{InputRequest, Machine};
use super::memory::Region;
use super::mutex::{Resource, SignalOutcome, WaitOutcome};
use super::{KernelError, Pid};

const MAX_PRINT_RANGE: i64 = 1000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssignSource {
    Literal(String),
    Input,
    ReadFile(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    Print(String),
    Assign { variable: String, source: AssignSource },
    WriteFile { file: String, value: String },
    ReadFile(String),
    PrintFromTo { from: String, to: String },
    SemWait(Resource),
    SemSignal(Resource),
}

impl FromStr for Instruction {
    type Err = KernelError;

    fn from_str(line: &str) -> Result<Instruction, KernelError> {
        let invalid = || KernelError::InvalidInstruction(line.to_string());
        let resource = |name: &str| name.parse::<Resource>().map_err(|_| invalid());
        let tokens: Vec<&str> = line.split_whitespace().collect();

        let instruction = match tokens.as_slice() {
            ["print", name] => Instruction::Print(name.to_string()),
            ["assign", variable, "input"] => Instruction::Assign {
                variable: variable.to_string(),
                source: AssignSource::Input,
            },
            ["assign", variable, "readFile", file] => Instruction::Assign {
                variable: variable.to_string(),
                source: AssignSource::ReadFile(file.to_string()),
            },
            ["assign", variable, value] => Instruction::Assign {
                variable: variable.to_string(),
                source: AssignSource::Literal(value.to_string()),
            },
            ["writeFile", file, value] => Instruction::WriteFile {
                file: file.to_string(),
                value: value.to_string(),
            },
            ["readFile", file] => Instruction::ReadFile(file.to_string()),
            ["printFromTo", from, to] => Instruction::PrintFromTo {
                from: from.to_string(),
                to: to.to_string(),
            },
            ["semWait", name] => Instruction::SemWait(resource(name)?),
            ["semSignal", name] => Instruction::SemSignal(resource(name)?),
            _ => return Err(invalid()),
        };

        Ok(instruction)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Print(name) => write!(f, "print {}", name),
            Instruction::Assign { variable, source } => match source {
                AssignSource::Literal(value) => write!(f, "assign {} {}", variable, value),
                AssignSource::Input => write!(f, "assign {} input", variable),
                AssignSource::ReadFile(file) => write!(f, "assign {} readFile {}", variable, file),
            },
            Instruction::WriteFile { file, value } => write!(f, "writeFile {} {}", file, value),
            Instruction::ReadFile(file) => write!(f, "readFile {}", file),
            Instruction::PrintFromTo { from, to } => write!(f, "printFromTo {} {}", from, to),
            Instruction::SemWait(resource) => write!(f, "semWait {}", resource),
            Instruction::SemSignal(resource) => write!(f, "semSignal {}", resource),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Interrupt {
    Completed,
    Blocked(Resource),
    AwaitingInput,
    /// The instruction could not run this turn and will be retried.
    Stalled,
    Exited,
}

pub(crate) struct Cpu;

impl Cpu {
    pub fn decode(line: &str) -> Result<Instruction, KernelError> {
        line.parse()
    }

    pub fn step(machine: &mut Machine, pid: Pid) -> Result<Interrupt, KernelError> {
        let pcb = machine.processes.get(pid)?;
        if pcb.is_finished() {
            return Ok(Interrupt::Exited);
        }
        let address = pcb.program_counter;
        let region = pcb.get_region();

        let line = machine.memory.instruction_at(address).unwrap_or_default().to_string();
        machine.record(format!("PID {}: Executing : {}", pid, line));
        machine.processes.update(pid, |pcb| pcb.current_instruction = line.clone())?;

        let interrupt = match Cpu::decode(&line) {
            Ok(instruction) => Cpu::execute(machine, pid, region, &instruction),
            Err(err) => {
                machine.warn(format!("PID {}: {}", pid, err));
                Interrupt::Completed
            }
        };

        if interrupt == Interrupt::Completed {
            machine.processes.update(pid, |pcb| pcb.program_counter += 1)?;
        }
        machine.sync_header(pid);

        Ok(interrupt)
    }

    fn execute(machine: &mut Machine, pid: Pid, region: Region, instruction: &Instruction) -> Interrupt {
        match instruction {
            Instruction::Print(name) => Cpu::execute_print(machine, pid, region, name),
            Instruction::Assign { variable, source } => {
                Cpu::execute_assign(machine, pid, region, variable, source)
            }
            Instruction::WriteFile { file, value } => {
                Cpu::execute_write_file(machine, pid, region, file, value)
            }
            Instruction::ReadFile(file) => Cpu::execute_read_file(machine, pid, region, file),
            Instruction::PrintFromTo { from, to } => {
                Cpu::execute_print_from_to(machine, pid, region, from, to)
            }
            Instruction::SemWait(resource) => Cpu::execute_sem_wait(machine, pid, *resource),
            Instruction::SemSignal(resource) => Cpu::execute_sem_signal(machine, pid, *resource),
        }
    }

    fn execute_print(machine: &mut Machine, pid: Pid, region: Region, name: &str) -> Interrupt {
        match Cpu::lookup(machine, region, name) {
            Some(value) if value.is_empty() => machine.record(format!("PID {}: {} empty", pid, name)),
            Some(value) => machine.record(format!("PID {}: Print {} = {}", pid, name, value)),
            None => machine.record(format!("PID {}: Print literal {}", pid, name)),
        }

        Interrupt::Completed
    }

    fn execute_assign(
        machine: &mut Machine,
        pid: Pid,
        region: Region,
        variable: &str,
        source: &AssignSource,
    ) -> Interrupt {
        let value = match source {
            AssignSource::Literal(value) => value.clone(),
            AssignSource::Input => {
                machine.input_requests.push_back(InputRequest {
                    pid,
                    variable: variable.to_string(),
                });
                machine.record(format!("PID {}: Waiting for input for {}", pid, variable));
                return Interrupt::AwaitingInput;
            }
            AssignSource::ReadFile(file) => {
                let Some(path) = Cpu::resolve_path(machine, pid, region, file) else {
                    return Interrupt::Completed;
                };
                match fs::read_to_string(&path) {
                    Ok(contents) => contents.trim_end().to_string(),
                    Err(err) => {
                        machine.warn(format!("PID {}: Cannot open file '{}': {}", pid, path, err));
                        return Interrupt::Completed;
                    }
                }
            }
        };

        match machine.memory.store_variable(pid, region, variable, &value) {
            Ok(_) => machine.record(format!("PID {}: Assigned {} = {}", pid, variable, value)),
            Err(err) => machine.warn(err.to_string()),
        }

        Interrupt::Completed
    }

    fn execute_write_file(machine: &mut Machine, pid: Pid, region: Region, file: &str, value: &str) -> Interrupt {
        let Some(path) = Cpu::resolve_path(machine, pid, region, file) else {
            return Interrupt::Completed;
        };
        let contents = Cpu::lookup(machine, region, value).unwrap_or_else(|| value.to_string());

        match fs::write(&path, &contents) {
            Ok(()) => machine.record(format!("PID {}: Wrote {} = '{}' to {}", pid, value, contents, path)),
            Err(err) => machine.warn(format!("PID {}: Cannot open file '{}': {}", pid, path, err)),
        }

        Interrupt::Completed
    }

    fn execute_read_file(machine: &mut Machine, pid: Pid, region: Region, file: &str) -> Interrupt {
        let Some(path) = Cpu::resolve_path(machine, pid, region, file) else {
            return Interrupt::Completed;
        };

        match fs::read_to_string(&path) {
            Ok(contents) => {
                for line in contents.lines() {
                    machine.record(format!("PID {}: Read {} from {}", pid, line, path));
                }
            }
            Err(err) => machine.warn(format!("PID {}: Cannot open file '{}': {}", pid, path, err)),
        }

        Interrupt::Completed
    }

    fn execute_print_from_to(machine: &mut Machine, pid: Pid, region: Region, from: &str, to: &str) -> Interrupt {
        let bounds = (Cpu::resolve_bound(machine, region, from), Cpu::resolve_bound(machine, region, to));
        let (start, end) = match bounds {
            (Some(start), Some(end)) => (start, end),
            _ => {
                machine.warn(format!("PID {}: Cannot resolve range {} to {}", pid, from, to));
                return Interrupt::Completed;
            }
        };

        let mut last = end;
        if end.saturating_sub(start) >= MAX_PRINT_RANGE {
            last = start + MAX_PRINT_RANGE - 1;
            machine.warn(format!("PID {}: Range {} to {} truncated at {}", pid, start, end, last));
        }
        let numbers: Vec<String> = (start..=last).map(|number| number.to_string()).collect();

        machine.record(format!("PID {}: Print from {} to {}: {}", pid, start, end, numbers.join(" ")));
        Interrupt::Completed
    }

    fn execute_sem_wait(machine: &mut Machine, pid: Pid, resource: Resource) -> Interrupt {
        match machine.mutexes.get_mut(resource).wait(pid) {
            Ok(WaitOutcome::Acquired) | Ok(WaitOutcome::AlreadyOwned) => {
                machine.record(format!("PID {}: Acquired {}", pid, resource));
                Interrupt::Completed
            }
            Ok(WaitOutcome::Blocked) => match machine.block(pid, resource) {
                Ok(()) => Interrupt::Blocked(resource),
                Err(err) => {
                    machine.mutexes.get_mut(resource).remove_waiter(pid);
                    machine.warn(err.to_string());
                    Interrupt::Stalled
                }
            },
            Err(err) => {
                machine.warn(format!("PID {}: {}", pid, err));
                Interrupt::Stalled
            }
        }
    }

    fn execute_sem_signal(machine: &mut Machine, pid: Pid, resource: Resource) -> Interrupt {
        match machine.release_mutex(resource, pid) {
            SignalOutcome::Released | SignalOutcome::HandedOff(_) => {
                machine.record(format!("PID {}: Released {}", pid, resource))
            }
            SignalOutcome::NotLocked => {
                machine.warn(format!("PID {}: {} not locked, no action taken", pid, resource))
            }
            SignalOutcome::NotOwner { owner } => machine.warn(format!(
                "PID {}: Cannot release {} held by PID {}",
                pid, resource, owner
            )),
        }

        Interrupt::Completed
    }

    fn lookup(machine: &Machine, region: Region, name: &str) -> Option<String> {
        machine.memory.variable(region, name).map(|variable| variable.value.clone())
    }

    fn resolve_path(machine: &mut Machine, pid: Pid, region: Region, name: &str) -> Option<String> {
        let path = Cpu::lookup(machine, region, name);
        if path.is_none() {
            let err = KernelError::VariableNotFound {
                pid,
                name: name.to_string(),
            };
            machine.warn(err.to_string());
        }

        path
    }

    fn resolve_bound(machine: &Machine, region: Region, operand: &str) -> Option<i64> {
        operand.parse().ok().or_else(|| {
            Cpu::lookup(machine, region, operand).and_then(|value| value.trim().parse().ok())
        })
    }
}
