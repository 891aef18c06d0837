//! Console reports, rendered from read-only snapshots so no lock is held
//! while printing.

use std::fs;

use kernel::query::{ProcessSnapshot, SystemSnapshot};
use kernel::Kernel;
use types::ProcessState;

const REPORT_PATH: &str = "csopesy-log.txt";

fn utilization(running: usize, cores: usize) -> f32 {
    if cores == 0 {
        0.0
    } else {
        running as f32 / cores as f32 * 100.0
    }
}

fn progress(process: &ProcessSnapshot) -> String {
    format!("({}/{})", process.pc, process.program_len)
}

/// `screen -ls`: CPU summary, active processes, the next READY processes in
/// true scheduler order, then completed ones.
pub fn screen_ls(snapshot: &SystemSnapshot) {
    if snapshot.processes.is_empty() {
        println!("No processes created.");
        return;
    }

    let running = snapshot.count(ProcessState::Running);
    let ready = snapshot.count(ProcessState::Ready);
    let sleeping = snapshot.count(ProcessState::Sleeping);
    let finished = snapshot.count(ProcessState::Finished);

    println!("\n=== CPU SUMMARY ===");
    println!(
        "CPU Utilization: {}%",
        utilization(running, snapshot.num_cpu)
    );
    println!("Cores Used: {running}/{}", snapshot.num_cpu);
    println!("Cores Available: {}", snapshot.num_cpu - running.min(snapshot.num_cpu));
    println!("Ready: {ready} | Sleeping: {sleeping} | Finished: {finished}");

    println!("\n=== PROCESS TABLE ===");
    for process in &snapshot.processes {
        if matches!(process.state, ProcessState::Running | ProcessState::Sleeping) {
            println!(
                "  {} [PID {}] - {} {}",
                process.name,
                process.pid,
                process.state,
                progress(process)
            );
        }
    }

    // The next four READY processes, in the order the scheduler would pick
    // them (RR scan starts at the cursor; FCFS is table order).
    let total = snapshot.processes.len();
    let cursor = if total == 0 { 0 } else { snapshot.rr_cursor % total };
    let mut upcoming = Vec::new();
    for offset in 0..total {
        let index = (cursor + offset) % total;
        let process = &snapshot.processes[index];
        if process.state == ProcessState::Ready {
            upcoming.push(process);
            if upcoming.len() >= 4 {
                break;
            }
        }
    }
    for process in &upcoming {
        println!(
            "  {} [PID {}] - READY {}",
            process.name,
            process.pid,
            progress(process)
        );
    }
    if running == 0 && sleeping == 0 && upcoming.is_empty() {
        println!("  (No active or upcoming processes)");
    }

    let mut printed_header = false;
    for process in &snapshot.processes {
        if process.state.is_terminal() {
            if !printed_header {
                println!("\n=== COMPLETED PROCESSES ===");
                printed_header = true;
            }
            println!(
                "  {} [PID {}] - {} {}",
                process.name,
                process.pid,
                process.state,
                progress(process)
            );
        }
    }
    if !printed_header {
        println!("\n(No completed processes yet)");
    }
    println!("=====================\n");
}

/// `report-util`: utilization summary to console and `csopesy-log.txt`.
pub fn report_util(snapshot: &SystemSnapshot) {
    let running = snapshot.count(ProcessState::Running);
    let ready = snapshot.count(ProcessState::Ready);
    let sleeping = snapshot.count(ProcessState::Sleeping);
    let finished = snapshot.count(ProcessState::Finished);
    let util = utilization(running, snapshot.num_cpu);

    println!("\n=== CPU UTILIZATION REPORT ===");
    println!("CPU Utilization: {util}%");
    println!("Cores Used: {running}/{}", snapshot.num_cpu);
    println!("Ready: {ready} | Sleeping: {sleeping} | Finished: {finished}");

    println!("\n=== PROCESS DETAILS ===");
    for process in &snapshot.processes {
        println!(
            "  {} [PID {}] - {} {}",
            process.name,
            process.pid,
            process.state,
            progress(process)
        );
    }
    println!("===============================");

    let mut log = String::new();
    log.push_str("=== CPU UTILIZATION REPORT ===\n");
    log.push_str(&format!("CPU Utilization: {util}%\n"));
    log.push_str(&format!("Cores Used: {running}/{}\n", snapshot.num_cpu));
    log.push_str(&format!(
        "Ready: {ready} | Sleeping: {sleeping} | Finished: {finished}\n"
    ));
    log.push_str("==============================\n");
    if snapshot.processes.is_empty() {
        log.push_str("No processes created.\n");
    } else {
        log.push_str("=== PROCESS TABLE ===\n");
        for process in &snapshot.processes {
            log.push_str(&format!(
                "  {} [PID {}] - {} {}\n",
                process.name,
                process.pid,
                process.state,
                progress(process)
            ));
        }
        log.push_str("=====================\n");
    }

    match fs::write(REPORT_PATH, log) {
        Ok(()) => println!("Report saved to {REPORT_PATH}\n"),
        Err(err) => println!("Error: Unable to create {REPORT_PATH}: {err}\n"),
    }
}

/// `vmstat`: memory totals, coarse tick figures derived from the raw
/// counters, and the paging counters.
pub fn vmstat(snapshot: &SystemSnapshot) {
    let idle_ticks = snapshot.tick * snapshot.num_cpu as u64;
    let active_ticks = snapshot.tick;

    println!("\n=== VMSTAT ===");
    println!("{} K total memory", snapshot.gauges.total_bytes);
    println!("{} K used memory", snapshot.gauges.used_bytes);
    println!("{} K free memory", snapshot.gauges.free_bytes);
    println!("{idle_ticks} idle cpu ticks");
    println!("{active_ticks} active cpu ticks");
    println!("{} pages paged in", snapshot.vm.pages_paged_in);
    println!("{} pages paged out", snapshot.vm.pages_paged_out);
    println!("=================\n");
}

/// Global `process-smi`: per-process memory summary sorted by resident RAM.
pub fn process_smi_global(snapshot: &SystemSnapshot) {
    if snapshot.processes.is_empty() {
        println!("No processes created.");
        return;
    }

    let running = snapshot.count(ProcessState::Running);
    let mut rows: Vec<&ProcessSnapshot> = snapshot.processes.iter().collect();
    rows.sort_by(|a, b| {
        let ram_a = a.pages_resident * snapshot.gauges.frame_size;
        let ram_b = b.pages_resident * snapshot.gauges.frame_size;
        ram_b.cmp(&ram_a)
    });
    let total_resident: usize = rows
        .iter()
        .map(|p| p.pages_resident * snapshot.gauges.frame_size)
        .sum();

    println!("\n========================== PROCESS-SMI ==========================");
    println!(
        "CPU Utilization: {}%",
        utilization(running, snapshot.num_cpu)
    );
    println!("Total Memory: {} bytes", snapshot.gauges.total_bytes);
    println!("Used Memory:  {} bytes", snapshot.gauges.used_bytes);
    println!("Free Memory:  {} bytes", snapshot.gauges.free_bytes);
    println!("-----------------------------------------------------------------");
    println!("Total Resident Memory (All Processes): {total_resident} bytes");
    println!("-----------------------------------------------------------------");
    println!(
        "{:<12}{:<7}{:<17}{:<10}{:<8}{:<10}{:<8}{:<10}",
        "Name", "PID", "State", "MemReq", "Pages", "Resident", "Dirty", "RAM Used"
    );
    for process in rows {
        println!(
            "{:<12}{:<7}{:<17}{:<10}{:<8}{:<10}{:<8}{:<10}",
            process.name,
            process.pid.to_string(),
            process.state.to_string(),
            process.memory_required,
            process.pages_total,
            process.pages_resident,
            process.pages_dirty,
            process.pages_resident * snapshot.gauges.frame_size,
        );
    }
    println!("=================================================================\n");
}

/// Process-mode `process-smi`: one process in full, with live variable
/// values where the page is resident.
pub fn process_smi(kernel: &Kernel, name: &str) {
    let snapshot = kernel.snapshot();
    let Some(process) = snapshot.processes.iter().find(|p| p.name == name) else {
        println!("Error: Process {name} not found.");
        return;
    };

    println!("\n=== Process SMI ===");
    println!("Name: {}", process.name);
    println!("PID: {}", process.pid);
    println!("State: {}", process.state);
    println!(
        "Instruction progress: {} / {}",
        process.pc, process.program_len
    );

    match kernel.variable_values(name) {
        Some(values) if !values.is_empty() => {
            println!("Variables (Stored in Page 0):");
            for (var, addr, value) in values {
                match value {
                    Some(value) => println!("  {var} @ Address {addr} = {value}"),
                    None => println!("  {var} @ Address {addr} = [Swapped Out]"),
                }
            }
        }
        _ => println!("Variables: (none)"),
    }

    if process.logs.is_empty() {
        println!("Logs: (none)");
    } else {
        println!("Logs:");
        for log in &process.logs {
            println!("  {log}");
        }
    }

    if process.state == ProcessState::Finished {
        println!("Process has finished execution.");
    }

    println!("\n--- Page Table ---");
    println!("Total Frames: {}", snapshot.gauges.total_frames);
    println!("Free Frames: {}", snapshot.gauges.free_frames);
    println!("Page | Frame | Valid | Dirty | Last Accessed");
    for row in &process.page_rows {
        let frame = row
            .frame
            .map(|f| f.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {}  | {}   | {}   | {}   | {}",
            row.page,
            frame,
            if row.frame.is_some() { "Yes" } else { "No " },
            if row.dirty { "Yes" } else { "No " },
            row.last_accessed
        );
    }
    println!("=====================\n");
}

/// `report-trace`: replay the execution trace file.
pub fn report_trace(path: &str) {
    match fs::read_to_string(path) {
        Ok(contents) => {
            println!("\n=== EXECUTION TRACE ===");
            for line in contents.lines() {
                println!("{line}");
            }
            println!("=======================");
        }
        Err(_) => println!("No trace log found."),
    }
}
