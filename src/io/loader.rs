use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::Program;

const ARRIVAL_SEPARATOR: char = '@';

pub fn parse_program(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn load_program_file(path: impl AsRef<Path>, arrival_time: u64) -> io::Result<Program> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;

    let program = Program {
        path: path.to_path_buf(),
        arrival_time,
        lines: parse_program(&text),
    };
    log::debug!("read {} lines from {}", program.len(), path.display());

    Ok(program)
}

pub fn parse_program_arg(arg: &str) -> Result<(PathBuf, u64), String> {
    match arg.rsplit_once(ARRIVAL_SEPARATOR) {
        Some((path, arrival)) if !path.is_empty() => {
            let arrival_time = arrival
                .parse()
                .map_err(|_| format!("invalid arrival time '{}' in '{}'", arrival, arg))?;
            Ok((PathBuf::from(path), arrival_time))
        }
        _ => Ok((PathBuf::from(arg), 0)),
    }
}
