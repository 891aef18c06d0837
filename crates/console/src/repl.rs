//! The interactive command loop: a MAIN console for system-level commands
//! and a PROCESS console attached to a single process.

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use kernel::scheduler::ensure_active;
use kernel::trace::TraceLog;
use kernel::{batch, Kernel};
use vm::{interp, parse_program};

use crate::config_file;
use crate::report;

const MAX_SUPPLIED_INSTRUCTIONS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Main,
    Process,
}

struct Repl {
    kernel: Option<Arc<Kernel>>,
    mode: Mode,
    current_process: String,
}

pub fn run(config_path: &Path) -> Result<()> {
    let mut repl = Repl {
        kernel: None,
        mode: Mode::Main,
        current_process: String::new(),
    };

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        match repl.mode {
            Mode::Main => print!("csopesy> "),
            Mode::Process => print!("{}> ", repl.current_process),
        }
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let tokens = tokenize(&line);
        if tokens.is_empty() {
            continue;
        }

        let keep_going = match repl.mode {
            Mode::Main => repl.main_command(config_path, &tokens),
            Mode::Process => repl.process_command(&tokens),
        };
        if !keep_going {
            break;
        }
    }

    if let Some(kernel) = &repl.kernel {
        kernel.request_shutdown();
    }
    Ok(())
}

/// Split on whitespace, keeping double-quoted stretches (quotes included)
/// as single tokens so supplied instruction strings survive.
fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in input.chars() {
        if ch == '"' {
            in_quotes = !in_quotes;
            current.push(ch);
        } else if ch.is_whitespace() && !in_quotes {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

impl Repl {
    /// Returns false when the loop should end.
    fn main_command(&mut self, config_path: &Path, tokens: &[String]) -> bool {
        match tokens[0].as_str() {
            "help" => {
                println!(
                    "Available commands:\n\
                     \x20 initialize          - Load configuration and prepare the system\n\
                     \x20 screen              - Create or manage processes\n\
                     \x20 scheduler start     - Begin automatic process creation\n\
                     \x20 scheduler stop      - Stop automatic process creation\n\
                     \x20 report-util         - Generate CPU report\n\
                     \x20 vmstat              - Memory and paging counters\n\
                     \x20 process-smi         - Per-process memory summary\n\
                     \x20 report-trace        - Show execution trace log\n\
                     \x20 exit                - Quit program"
                );
            }
            "initialize" => self.initialize(config_path),
            "screen" => self.screen(tokens),
            "scheduler" => self.scheduler(tokens),
            "report-util" => {
                if let Some(kernel) = self.ready_kernel() {
                    report::report_util(&kernel.snapshot());
                }
            }
            "vmstat" => {
                if let Some(kernel) = self.ready_kernel() {
                    report::vmstat(&kernel.snapshot());
                }
            }
            "process-smi" => {
                if let Some(kernel) = self.ready_kernel() {
                    report::process_smi_global(&kernel.snapshot());
                }
            }
            "report-trace" => report::report_trace(TraceLog::DEFAULT_PATH),
            "exit" => return false,
            other => println!("Unknown command '{other}'. Type 'help'."),
        }
        true
    }

    fn process_command(&mut self, tokens: &[String]) -> bool {
        match tokens[0].as_str() {
            "process-smi" => {
                if let Some(kernel) = self.ready_kernel() {
                    report::process_smi(&kernel, &self.current_process);
                }
            }
            "step" => self.step(),
            "exit" => {
                println!("Exiting process screen...");
                self.mode = Mode::Main;
                self.current_process.clear();
            }
            _ => println!("Invalid command in process screen."),
        }
        true
    }

    fn ready_kernel(&self) -> Option<Arc<Kernel>> {
        match &self.kernel {
            Some(kernel) => Some(Arc::clone(kernel)),
            None => {
                println!("Error: System not initialized. Type 'initialize' first.");
                None
            }
        }
    }

    fn initialize(&mut self, config_path: &Path) {
        if self.kernel.is_some() {
            println!("System already initialized.");
            return;
        }
        println!("Initializing system from {}...", config_path.display());

        let config = match config_file::load(config_path) {
            Ok(config) => config,
            Err(err) => {
                println!("{} {err:#}", "Initialization failed:".red());
                return;
            }
        };

        println!("Configuration loaded successfully:");
        println!("  num-cpu: {}", config.num_cpu);
        println!("  scheduler: {}", config.scheduler.as_str());
        println!("  quantum-cycles: {}", config.quantum_cycles);
        println!("  batch-process-freq: {}", config.batch_process_freq);
        println!("  instruction range: {}-{}", config.min_ins, config.max_ins);
        println!("  delays-per-exec: {}", config.delays_per_exec);
        println!(
            "  Memory: {} bytes ({} frames x {} bytes)",
            config.max_overall_mem,
            config.total_frames(),
            config.mem_per_frame
        );

        match Kernel::with_default_backing(config) {
            Ok(kernel) => {
                self.kernel = Some(Arc::new(kernel));
                println!("System initialization complete.\n");
            }
            Err(err) => println!("{} {err}", "Initialization failed:".red()),
        }
    }

    fn screen(&mut self, tokens: &[String]) {
        let Some(kernel) = self.ready_kernel() else {
            return;
        };
        if tokens.len() == 1 {
            println!(
                "Usage:\n\
                 \x20 screen -s <process_name> <memory>\n\
                 \x20 screen -c <process_name> <memory> \"<instructions>\"\n\
                 \x20 screen -r <process_name>\n\
                 \x20 screen -ls"
            );
            return;
        }

        match tokens[1].as_str() {
            "-s" => {
                if tokens.len() != 4 {
                    println!("Usage: screen -s <process_name> <memory>");
                    return;
                }
                let name = &tokens[2];
                let Some(memory) = parse_memory_argument(&tokens[3]) else {
                    return;
                };
                let count = batch::random_instruction_count(&kernel.config);
                let program = batch::random_program(count, memory);
                match kernel.create_process(name, memory, program) {
                    Ok(pid) => {
                        println!("Created new process: {name} (PID {pid}) with {memory} bytes.");
                        println!("Attached to process screen.");
                        ensure_active(&kernel);
                        self.mode = Mode::Process;
                        self.current_process = name.clone();
                    }
                    Err(err) => println!("Error: {err}."),
                }
            }
            "-c" => {
                if tokens.len() != 5 {
                    println!("Usage: screen -c <process_name> <memory> \"<instructions>\"");
                    return;
                }
                let name = &tokens[2];
                let Some(memory) = parse_memory_argument(&tokens[3]) else {
                    return;
                };
                let source = tokens[4].trim_matches('"');
                let program = match parse_program(source) {
                    Ok(program) => program,
                    Err(err) => {
                        println!("Invalid command: {}", err.line());
                        return;
                    }
                };
                if program.is_empty() || program.len() > MAX_SUPPLIED_INSTRUCTIONS {
                    println!("invalid command");
                    return;
                }
                let count = program.len();
                match kernel.create_process(name, memory, program) {
                    Ok(pid) => {
                        println!(
                            "Created new process: {name} (PID {pid}) with {memory} bytes \
                             and {count} instructions."
                        );
                        println!("Attached to process screen.");
                        ensure_active(&kernel);
                        self.mode = Mode::Process;
                        self.current_process = name.clone();
                    }
                    Err(err) => println!("Error: {err}."),
                }
            }
            "-r" if tokens.len() >= 3 => {
                let name = &tokens[2];
                let attached = {
                    let procs = kernel.procs.lock().unwrap();
                    match procs.find_by_name(name) {
                        None => {
                            println!("Process {name} not found.");
                            None
                        }
                        Some(process) if process.state == types::ProcessState::Finished => {
                            println!("Process {name} already finished.");
                            None
                        }
                        Some(process) => Some(process.pid),
                    }
                };
                if let Some(pid) = attached {
                    println!("Reattached to process {name} (PID {pid})");
                    self.mode = Mode::Process;
                    self.current_process = name.clone();
                }
            }
            "-ls" => report::screen_ls(&kernel.snapshot()),
            _ => println!("Usage: screen [-s|-c|-r|-ls]"),
        }
    }

    fn scheduler(&mut self, tokens: &[String]) {
        let Some(kernel) = self.ready_kernel() else {
            return;
        };
        if tokens.len() == 1 {
            println!("Usage:\n  scheduler start\n  scheduler stop");
            return;
        }
        match tokens[1].as_str() {
            "start" => {
                let freq = kernel.config.batch_process_freq;
                let plural = if freq == 1 { "" } else { "s" };
                if kernel.auto_create.swap(true, Ordering::AcqRel) {
                    println!("Auto-creation is already running (every {freq} tick{plural}).");
                    ensure_active(&kernel);
                    return;
                }
                ensure_active(&kernel);
                println!("Auto-creation started: new process every {freq} tick{plural}.");
            }
            "stop" => {
                if !kernel.auto_create.swap(false, Ordering::AcqRel) {
                    println!("Auto-creation is not running.");
                    return;
                }
                println!("Auto-creation stopped.");
            }
            _ => println!("Invalid command. Use 'scheduler start' or 'scheduler stop'."),
        }
    }

    /// Single-step the attached process outside the scheduler.
    fn step(&mut self) {
        let Some(kernel) = self.ready_kernel() else {
            return;
        };
        // Lock order: memory before processes.
        let mut mem = kernel.memory.lock().unwrap();
        let mut procs = kernel.procs.lock().unwrap();
        let Some((pid, runnable)) = procs
            .find_by_name(&self.current_process)
            .map(|p| (p.pid, !p.is_done() && !p.state.is_terminal()))
        else {
            println!("No active process.");
            return;
        };
        if runnable {
            interp::step(&mut procs, &mut mem, pid);
        }
        let pc = procs.get(pid).map_or(0, |p| p.pc);
        println!(
            "Executed instruction {pc} for process {}.",
            self.current_process
        );
    }
}

/// Memory arguments must be integral; the power-of-two and range checks live
/// in the kernel.
fn parse_memory_argument(token: &str) -> Option<usize> {
    match token.parse::<usize>() {
        Ok(bytes) => Some(bytes),
        Err(_) => {
            println!("Error: Invalid memory argument. Must be an integer.");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::tokenize;

    #[test]
    fn tokenize_keeps_quoted_instruction_strings_whole() {
        let tokens = tokenize("screen -c demo 64 \"DECLARE(x, 5); PRINT('x=' + x)\"");
        assert_eq!(
            tokens,
            vec![
                "screen",
                "-c",
                "demo",
                "64",
                "\"DECLARE(x, 5); PRINT('x=' + x)\"",
            ]
        );
    }

    #[test]
    fn tokenize_collapses_plain_whitespace() {
        assert_eq!(tokenize("  screen   -ls  "), vec!["screen", "-ls"]);
        assert!(tokenize("   ").is_empty());
    }
}
