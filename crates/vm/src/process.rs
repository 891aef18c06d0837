use std::collections::BTreeMap;

use memory::paging::{PageDirectory, PageTable};
use types::{Pid, ProcessState};

use crate::instruction::Instruction;

/// A simulated process: the program, the execution cursor, variable
/// bindings, and paging state. Everything the interpreter and the scheduler
/// act on lives here.
///
/// Variables occupy 2-byte slots allocated from address 0 upward (page 0 of
/// the process's address space); `symbol_cursor` is the next free slot.
#[derive(Debug, Clone)]
pub struct Process {
    pub pid: Pid,
    pub name: String,
    pub state: ProcessState,
    pub program: Vec<Instruction>,
    pub pc: usize,
    pub sleep_counter: u32,
    pub memory_required: usize,
    pub symbols: BTreeMap<String, usize>,
    pub symbol_cursor: usize,
    pub page_table: PageTable,
    pub logs: Vec<String>,
}

impl Process {
    pub fn new(
        pid: Pid,
        name: String,
        memory_required: usize,
        pages: usize,
        program: Vec<Instruction>,
    ) -> Self {
        Self {
            pid,
            name,
            state: ProcessState::Ready,
            program,
            pc: 0,
            sleep_counter: 0,
            memory_required,
            symbols: BTreeMap::new(),
            symbol_cursor: 0,
            page_table: PageTable::with_pages(pages),
            logs: Vec::new(),
        }
    }

    /// The PC has run off the end of the program.
    pub fn is_done(&self) -> bool {
        self.pc >= self.program.len()
    }
}

/// Insertion-ordered process table plus the round-robin cursor.
///
/// FCFS selection order and the RR scan both follow insertion order, so the
/// container only grows during a run; entries are addressed by pid or index,
/// never by held references. All access is serialized by the kernel's
/// process-table mutex.
#[derive(Debug)]
pub struct ProcessTable {
    procs: Vec<Process>,
    next_pid: u32,
    pub rr_cursor: usize,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self {
            procs: Vec::new(),
            next_pid: 1,
            rr_cursor: 0,
        }
    }

    /// Hand out the next pid. Call once per inserted process.
    pub fn allocate_pid(&mut self) -> Pid {
        let pid = Pid(self.next_pid);
        self.next_pid += 1;
        pid
    }

    pub fn insert(&mut self, process: Process) {
        self.procs.push(process);
    }

    pub fn len(&self) -> usize {
        self.procs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procs.is_empty()
    }

    pub fn processes(&self) -> &[Process] {
        &self.procs
    }

    pub fn processes_mut(&mut self) -> &mut [Process] {
        &mut self.procs
    }

    pub fn get(&self, pid: Pid) -> Option<&Process> {
        self.procs.iter().find(|p| p.pid == pid)
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut Process> {
        self.procs.iter_mut().find(|p| p.pid == pid)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Process> {
        self.procs.iter().find(|p| p.name == name)
    }

    pub fn index_of(&self, pid: Pid) -> Option<usize> {
        self.procs.iter().position(|p| p.pid == pid)
    }

    /// Is any process other than `pid` waiting to run?
    pub fn any_ready_except(&self, pid: Pid) -> bool {
        self.procs
            .iter()
            .any(|p| p.state == ProcessState::Ready && p.pid != pid)
    }

    /// Non-empty and every process terminal: the scheduler may drain.
    pub fn all_terminal(&self) -> bool {
        !self.procs.is_empty() && self.procs.iter().all(|p| p.state.is_terminal())
    }

    /// Any process READY, RUNNING, or SLEEPING.
    pub fn has_active(&self) -> bool {
        self.procs.iter().any(|p| {
            matches!(
                p.state,
                ProcessState::Ready | ProcessState::Running | ProcessState::Sleeping
            )
        })
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PageDirectory for ProcessTable {
    fn memory_required(&self, pid: Pid) -> Option<usize> {
        self.get(pid).map(|p| p.memory_required)
    }

    fn page_table(&self, pid: Pid) -> Option<&PageTable> {
        self.get(pid).map(|p| &p.page_table)
    }

    fn page_table_mut(&mut self, pid: Pid) -> Option<&mut PageTable> {
        self.get_mut(pid).map(|p| &mut p.page_table)
    }
}
