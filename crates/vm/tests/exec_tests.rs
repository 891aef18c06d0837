use std::path::PathBuf;
use std::sync::Arc;

use memory::{BackingStore, MemoryManager};
use types::{Clock, Pid, ProcessState};
use vm::{interp, parse_program, Outcome, Process, ProcessTable};

struct Rig {
    procs: ProcessTable,
    mem: MemoryManager,
    clock: Arc<Clock>,
}

fn temp_backing(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("exec-{}-{}.txt", tag, std::process::id()))
}

fn rig(tag: &str, total_frames: usize, frame_size: usize) -> Rig {
    let clock = Arc::new(Clock::new());
    let backing = BackingStore::create(temp_backing(tag)).expect("create backing store");
    Rig {
        procs: ProcessTable::new(),
        mem: MemoryManager::new(total_frames, frame_size, Arc::clone(&clock), backing),
        clock,
    }
}

impl Rig {
    fn spawn(&mut self, source: &str, memory_required: usize) -> Pid {
        let program = parse_program(source).expect("test program parses");
        let pid = self.procs.allocate_pid();
        let pages = (memory_required + self.mem.frame_size() - 1) / self.mem.frame_size();
        self.procs.insert(Process::new(
            pid,
            format!("p{pid}"),
            memory_required,
            pages,
            program,
        ));
        pid
    }

    fn step(&mut self, pid: Pid) -> Outcome {
        self.clock.advance();
        interp::step(&mut self.procs, &mut self.mem, pid)
    }

    fn run_to_end(&mut self, pid: Pid) {
        while !matches!(self.step(pid), Outcome::Terminate | Outcome::Violation) {}
    }

    fn process(&self, pid: Pid) -> &Process {
        self.procs.get(pid).unwrap()
    }
}

#[test]
fn declare_add_print_flow() {
    let mut rig = rig("flow", 8, 16);
    let pid = rig.spawn(
        "DECLARE(x, 5); ADD(y, x, 3); PRINT('x=' + x); PRINT('y=' + y)",
        64,
    );

    for _ in 0..4 {
        assert_eq!(rig.step(pid), Outcome::Advance);
    }
    let process = rig.process(pid);
    assert_eq!(process.pc, 4);
    assert_eq!(process.logs, vec!["x=5", "y=8"]);
    // Variables pack into 2-byte slots from address 0.
    assert_eq!(process.symbols.get("x"), Some(&0));
    assert_eq!(process.symbols.get("y"), Some(&2));
}

#[test]
fn arithmetic_saturates_at_both_ends() {
    let mut rig = rig("clamp", 8, 16);
    let pid = rig.spawn(
        "DECLARE(a, 60000); ADD(big, a, 60000); SUBTRACT(small, a, 65535); \
         PRINT('big=' + big); PRINT('small=' + small)",
        64,
    );
    rig.run_to_end(pid);
    let process = rig.process(pid);
    assert_eq!(process.state, ProcessState::Finished);
    assert_eq!(process.logs, vec!["big=65535", "small=0"]);
}

#[test]
fn unbound_operand_reads_zero() {
    let mut rig = rig("loose", 8, 16);
    let pid = rig.spawn("ADD(sum, ghost, 2); PRINT('sum=' + sum + ' ghost=' + ghost)", 64);
    rig.run_to_end(pid);
    // `ghost` stays unbound: it reads 0 both as operand and in PRINT.
    assert_eq!(rig.process(pid).logs, vec!["sum=2 ghost=0"]);
}

#[test]
fn write_then_read_round_trips_through_paging() {
    let mut rig = rig("wr", 2, 2);
    let pid = rig.spawn(
        "WRITE(4, 99); DECLARE(pad, 1); READ(v, 4); PRINT('v=' + v)",
        8,
    );
    rig.run_to_end(pid);
    let process = rig.process(pid);
    assert_eq!(process.state, ProcessState::Finished);
    assert_eq!(process.logs, vec!["v=99"]);
    // READ bound its destination like DECLARE would.
    assert!(process.symbols.contains_key("v"));
}

#[test]
fn out_of_bounds_write_is_fatal_and_leaves_pc() {
    let mut rig = rig("segv", 4, 2);
    let pid = rig.spawn("WRITE(4, 1)", 4);
    assert_eq!(rig.step(pid), Outcome::Violation);
    let process = rig.process(pid);
    assert_eq!(process.state, ProcessState::MemoryViolated);
    assert_eq!(process.pc, 0);
}

#[test]
fn boundary_addresses() {
    let mut rig = rig("bounds", 4, 2);
    // memory_required - 1 is fine; memory_required itself violates.
    let ok = rig.spawn("WRITE(7, 1)", 8);
    assert_eq!(rig.step(ok), Outcome::Advance);

    let bad = rig.spawn("READ(v, 8)", 8);
    assert_eq!(rig.step(bad), Outcome::Violation);
}

#[test]
fn sleep_sets_counter_and_advances_pc() {
    let mut rig = rig("sleep", 4, 16);
    let pid = rig.spawn("SLEEP(3); PRINT('after')", 64);
    assert_eq!(rig.step(pid), Outcome::Sleep(3));
    let process = rig.process(pid);
    assert_eq!(process.state, ProcessState::Sleeping);
    assert_eq!(process.sleep_counter, 3);
    assert_eq!(process.pc, 1);
}

#[test]
fn for_expands_in_place_without_advancing() {
    let mut rig = rig("for", 4, 16);
    let pid = rig.spawn("FOR([PRINT('a')], 3); PRINT('tail')", 64);

    match rig.step(pid) {
        Outcome::ReplaceWith(expansion) => assert_eq!(expansion.len(), 3),
        other => panic!("expected expansion, got {other:?}"),
    }
    let process = rig.process(pid);
    assert_eq!(process.pc, 0);
    assert_eq!(process.program.len(), 4);

    rig.run_to_end(pid);
    assert_eq!(rig.process(pid).logs, vec!["a", "a", "a", "tail"]);
}

#[test]
fn for_with_zero_repeats_removes_the_slot() {
    let mut rig = rig("for0", 4, 16);
    let pid = rig.spawn("FOR([PRINT('never')], 0)", 64);

    assert_eq!(rig.step(pid), Outcome::ReplaceWith(Vec::new()));
    assert!(rig.process(pid).program.is_empty());

    assert_eq!(rig.step(pid), Outcome::Terminate);
    assert_eq!(rig.process(pid).state, ProcessState::Finished);
    assert!(rig.process(pid).logs.is_empty());
}

#[test]
fn round_trip_survives_eviction_pressure() {
    // Two frames, four pages: the written page is evicted and re-faulted.
    let mut rig = rig("pressure", 2, 2);
    let pid = rig.spawn(
        "WRITE(0, 7); WRITE(2, 8); WRITE(4, 9); WRITE(6, 10); READ(v, 0); PRINT('v=' + v)",
        8,
    );
    rig.run_to_end(pid);
    let process = rig.process(pid);
    assert_eq!(process.state, ProcessState::Finished);
    assert_eq!(process.logs, vec!["v=7"]);

    let stats = rig.mem.vm_stats();
    assert!(stats.pages_paged_in >= 4);
    assert!(stats.pages_paged_out >= 1);
    assert!(stats.pages_paged_out <= stats.pages_paged_in);
}
