//! The interpreter: one instruction of one process per call.
//!
//! All memory traffic flows through the paging layer and may fault; faults
//! are resolved synchronously inside the access, so an instruction either
//! completes this tick or the process is terminally violated. The stall path
//! is kept for defensive consistency: it leaves the PC unchanged so the
//! instruction would simply be retried next tick.

use memory::{Access, MemoryError, MemoryManager};
use types::{Pid, ProcessState};

use crate::instruction::{Instruction, Operand, PrintPiece};
use crate::process::ProcessTable;

/// What executing one instruction did to the process. By the time `step`
/// returns, the outcome has already been applied (PC, state, program).
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Instruction completed; PC advanced.
    Advance,
    /// A memory access could not be satisfied this tick; PC unchanged.
    Stall,
    /// Process went to sleep for the given number of ticks; PC advanced
    /// first, so the following instruction runs on the wake tick.
    Sleep(u32),
    /// The PC was already at the end of the program; process is finished.
    Terminate,
    /// Out-of-bounds access; the process is now MEMORY_VIOLATED, PC
    /// unchanged.
    Violation,
    /// FOR expansion spliced these instructions over the current slot; PC
    /// unchanged so the first of them runs on the process's next tick.
    ReplaceWith(Vec<Instruction>),
}

/// Saturate into the unsigned 16-bit value range.
pub fn clamp_u16(value: i64) -> u16 {
    value.clamp(0, u16::MAX as i64) as u16
}

/// Execute the current instruction of `pid` and apply its outcome.
pub fn step(procs: &mut ProcessTable, mem: &mut MemoryManager, pid: Pid) -> Outcome {
    let Some(process) = procs.get(pid) else {
        return Outcome::Stall;
    };
    if process.is_done() {
        if let Some(process) = procs.get_mut(pid) {
            process.state = ProcessState::Finished;
        }
        return Outcome::Terminate;
    }

    let instruction = process.program[process.pc].clone();
    let outcome = execute(&instruction, procs, mem, pid);

    let Some(process) = procs.get_mut(pid) else {
        return Outcome::Stall;
    };
    match &outcome {
        Outcome::Advance => process.pc += 1,
        Outcome::Sleep(ticks) => {
            process.pc += 1;
            process.sleep_counter = *ticks;
            process.state = ProcessState::Sleeping;
        }
        Outcome::Violation => process.state = ProcessState::MemoryViolated,
        Outcome::ReplaceWith(expansion) => {
            let pc = process.pc;
            process.program.splice(pc..pc + 1, expansion.iter().cloned());
        }
        Outcome::Stall | Outcome::Terminate => {}
    }
    outcome
}

fn execute(
    instruction: &Instruction,
    procs: &mut ProcessTable,
    mem: &mut MemoryManager,
    pid: Pid,
) -> Outcome {
    match instruction {
        Instruction::Declare { var, value } => {
            match store_var(procs, mem, pid, var, clamp_u16(*value)) {
                Ok(()) => Outcome::Advance,
                Err(err) => fault_outcome(err),
            }
        }

        Instruction::Add { target, lhs, rhs } => {
            arithmetic(procs, mem, pid, target, lhs, rhs, |a, b| a + b)
        }
        Instruction::Subtract { target, lhs, rhs } => {
            arithmetic(procs, mem, pid, target, lhs, rhs, |a, b| a - b)
        }

        Instruction::Print { pieces } => {
            let mut out = String::new();
            for piece in pieces {
                match piece {
                    PrintPiece::Text(text) => out.push_str(text),
                    PrintPiece::Value(operand) => {
                        match load_operand(procs, mem, pid, operand) {
                            Ok(value) => out.push_str(&value.to_string()),
                            Err(err) => return fault_outcome(err),
                        }
                    }
                }
            }
            if let Some(process) = procs.get_mut(pid) {
                process.logs.push(out);
            }
            Outcome::Advance
        }

        Instruction::Sleep { ticks } => Outcome::Sleep(*ticks),

        Instruction::For { body, repeats } => {
            let mut expansion = Vec::with_capacity(body.len() * *repeats as usize);
            for _ in 0..*repeats {
                expansion.extend(body.iter().cloned());
            }
            Outcome::ReplaceWith(expansion)
        }

        Instruction::Read { var, addr } => {
            let bounds = procs.get(pid).map_or(0, |p| p.memory_required);
            if *addr >= bounds {
                return Outcome::Violation;
            }
            match mem.access(procs, pid, *addr, Access::Read) {
                Ok(value) => match store_var(procs, mem, pid, var, value) {
                    Ok(()) => Outcome::Advance,
                    Err(err) => fault_outcome(err),
                },
                Err(err) => fault_outcome(err),
            }
        }

        Instruction::Write { addr, value } => {
            let source = match load_operand(procs, mem, pid, value) {
                Ok(value) => value,
                Err(err) => return fault_outcome(err),
            };
            let bounds = procs.get(pid).map_or(0, |p| p.memory_required);
            if *addr >= bounds {
                return Outcome::Violation;
            }
            match mem.access(procs, pid, *addr, Access::Write(source)) {
                Ok(_) => Outcome::Advance,
                Err(err) => fault_outcome(err),
            }
        }
    }
}

fn arithmetic(
    procs: &mut ProcessTable,
    mem: &mut MemoryManager,
    pid: Pid,
    target: &str,
    lhs: &Operand,
    rhs: &Operand,
    op: fn(i64, i64) -> i64,
) -> Outcome {
    let a = match load_operand(procs, mem, pid, lhs) {
        Ok(value) => value,
        Err(err) => return fault_outcome(err),
    };
    let b = match load_operand(procs, mem, pid, rhs) {
        Ok(value) => value,
        Err(err) => return fault_outcome(err),
    };
    let result = clamp_u16(op(a as i64, b as i64));
    match store_var(procs, mem, pid, target, result) {
        Ok(()) => Outcome::Advance,
        Err(err) => fault_outcome(err),
    }
}

/// Resolve an operand. Literals clamp; bound variables load through the
/// paging layer; unbound variables read as 0.
fn load_operand(
    procs: &mut ProcessTable,
    mem: &mut MemoryManager,
    pid: Pid,
    operand: &Operand,
) -> Result<u16, MemoryError> {
    match operand {
        Operand::Literal(value) => Ok(clamp_u16(*value)),
        Operand::Var(name) => {
            let addr = procs
                .get(pid)
                .and_then(|p| p.symbols.get(name).copied());
            match addr {
                None => Ok(0),
                Some(addr) => mem.access(procs, pid, addr, Access::Read),
            }
        }
    }
}

/// Write a variable, allocating its 2-byte slot on first use. The symbol is
/// bound only after the write succeeds, so a failed write leaves no dangling
/// out-of-bounds binding.
fn store_var(
    procs: &mut ProcessTable,
    mem: &mut MemoryManager,
    pid: Pid,
    name: &str,
    value: u16,
) -> Result<(), MemoryError> {
    let (addr, is_new) = {
        let process = procs.get(pid).ok_or(MemoryError::NoSuchProcess(pid))?;
        match process.symbols.get(name) {
            Some(addr) => (*addr, false),
            None => (process.symbol_cursor, true),
        }
    };
    mem.access(procs, pid, addr, Access::Write(value))?;
    if is_new {
        if let Some(process) = procs.get_mut(pid) {
            process.symbols.insert(name.to_string(), addr);
            process.symbol_cursor = addr + 2;
        }
    }
    Ok(())
}

/// A segmentation fault is terminal; anything else leaves the instruction to
/// be retried.
fn fault_outcome(err: MemoryError) -> Outcome {
    match err {
        MemoryError::SegmentationFault { .. } => Outcome::Violation,
        MemoryError::NoSuchProcess(_) => Outcome::Stall,
    }
}
