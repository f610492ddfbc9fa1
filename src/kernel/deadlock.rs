use super::machine::Machine;
use super::mutex::Resource;

pub(crate) fn detect_and_recover(machine: &mut Machine, advanced: bool) -> bool {
    let blocked = machine.mutexes.total_waiters();
    if advanced
        || blocked == 0
        || !machine.input_requests.is_empty()
        || machine.clock <= machine.config.deadlock_threshold
    {
        return false;
    }

    machine.warn(format!("Deadlock: {} processes blocked", blocked));
    for resource in Resource::ALL {
        recover_waiter(machine, resource);
    }

    true
}

fn recover_waiter(machine: &mut Machine, resource: Resource) {
    let processes = &machine.processes;
    let waiter = machine
        .mutexes
        .get_mut(resource)
        .pop_highest_priority_waiter(|pid| processes.get(pid).map_or(usize::MAX, |pcb| pcb.priority));
    let Some(pid) = waiter else {
        return;
    };

    let retries = match machine.processes.get(pid) {
        Ok(pcb) => pcb.deadlock_retries,
        Err(_) => {
            machine.warn(format!("PCB not found for PID {}, discarding", pid));
            return;
        }
    };

    let budget = machine.config.deadlock_retry_budget;
    if retries >= budget {
        machine.warn(format!("PID {}: Exceeded deadlock attempts, terminating", pid));
        machine.terminate(pid);
        return;
    }

    let _ = machine.processes.update(pid, |pcb| pcb.deadlock_retries += 1);
    match machine.make_ready(pid) {
        Ok(level) => machine.record(format!(
            "PID {}: Unblocked to Queue {} (attempt {} of {})",
            pid,
            level,
            retries + 1,
            budget
        )),
        Err(err) => machine.warn(format!("PID {}: {}", pid, err)),
    }
}
