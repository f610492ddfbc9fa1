use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use scheduler_sim::io::{console_logger, loader};
use scheduler_sim::{Driver, SchedulingAlgorithm, SimulationConfig};

const USAGE: &str =
    "usage: scheduler-simulator [--policy mlfq|rr|fcfs] [--quantum N] [--config FILE] PROGRAM[@ARRIVAL]...";

struct Options {
    policy: Option<SchedulingAlgorithm>,
    quantum: Option<usize>,
    config: Option<PathBuf>,
    programs: Vec<(PathBuf, u64)>,
}

impl Options {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Options, String> {
        let mut options = Options {
            policy: None,
            quantum: None,
            config: None,
            programs: Vec::new(),
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--policy" => {
                    let value = args.next().ok_or("--policy needs a value")?;
                    options.policy = Some(value.parse::<SchedulingAlgorithm>().map_err(|err| err.to_string())?);
                }
                "--quantum" => {
                    let value = args.next().ok_or("--quantum needs a value")?;
                    options.quantum = Some(value.parse::<usize>().map_err(|_| format!("invalid quantum '{}'", value))?);
                }
                "--config" => {
                    let value = args.next().ok_or("--config needs a value")?;
                    options.config = Some(PathBuf::from(value));
                }
                _ => options.programs.push(loader::parse_program_arg(&arg)?),
            }
        }

        if options.programs.is_empty() {
            return Err("no program files given".to_string());
        }
        Ok(options)
    }
}

fn print_events(driver: &mut Driver) {
    for event in driver.drain_events() {
        println!("{}", event);
    }
}

fn main() -> ExitCode {
    if let Err(err) = console_logger::init(console_logger::level_from_env()) {
        eprintln!("Failed to install logger: {}", err);
    }

    let options = match Options::parse(env::args().skip(1)) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{}", err);
            eprintln!("{}", USAGE);
            return ExitCode::FAILURE;
        }
    };

    let mut config = match &options.config {
        Some(path) => match SimulationConfig::from_json_file(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("{}: {}", path.display(), err);
                return ExitCode::FAILURE;
            }
        },
        None => SimulationConfig::default(),
    };
    if let Some(policy) = options.policy {
        config.policy = policy;
    }
    if let Some(quantum) = options.quantum {
        if quantum == 0 {
            eprintln!("quantum must be at least 1");
            return ExitCode::FAILURE;
        }
        config.rr_quantum = quantum;
    }
    let max_cycles = config.max_cycles;

    let mut driver = Driver::with_config(config);
    for (path, arrival_time) in &options.programs {
        let program = match loader::load_program_file(path, *arrival_time) {
            Ok(program) => program,
            Err(err) => {
                eprintln!("Error opening file {}: {}", path.display(), err);
                continue;
            }
        };

        match driver.add_process(&program.lines, program.arrival_time) {
            Ok(pid) => println!(
                "Added process {} from {} with arrival time {}",
                pid,
                path.display(),
                program.arrival_time
            ),
            Err(err) => eprintln!("Cannot load {}: {}", path.display(), err),
        }
    }
    print_events(&mut driver);

    let stdin = io::stdin();
    let mut input = stdin.lock();
    while !driver.all_finished() && driver.clock() < max_cycles {
        driver.advance_cycle();
        print_events(&mut driver);

        while let Some((pid, variable)) = driver.pending_input() {
            print!("PID {}: enter value for {}: ", pid, variable);
            let _ = io::stdout().flush();

            let mut line = String::new();
            match input.read_line(&mut line) {
                Ok(0) | Err(_) => {
                    eprintln!("Input closed while PID {} waits for {}", pid, variable);
                    return ExitCode::FAILURE;
                }
                Ok(_) => {}
            }
            if let Err(err) = driver.supply_input(line.trim()) {
                eprintln!("{}", err);
            }
            print_events(&mut driver);
        }
    }

    if !driver.all_finished() {
        println!("Reached {} cycles with processes still live, possible deadlock", max_cycles);
    }

    match serde_json::to_string_pretty(&driver.snapshot()) {
        Ok(json) => println!("{}", json),
        Err(err) => eprintln!("Cannot serialize final state: {}", err),
    }

    ExitCode::SUCCESS
}
