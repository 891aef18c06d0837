//! Synthesis of auto-created ("batch") processes.

use once_cell::sync::Lazy;
use rand::Rng;
use types::SystemConfig;
use vm::{parse_line, Instruction};

/// Template pool for generated programs. `%ADDR%` placeholders are replaced
/// with a random in-range byte address before parsing.
static TEMPLATE_POOL: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "DECLARE(x, 5)",
        "DECLARE(y, 10)",
        "ADD(sum, x, y)",
        "SUBTRACT(diff, y, x)",
        "PRINT('Hello world!')",
        "PRINT('Value of sum: ' + sum)",
        "SLEEP(2)",
        "FOR([PRINT('Hello world!')], 2)",
        "WRITE(%ADDR%, 42)",
        "READ(val, %ADDR%)",
        "PRINT('Loaded value: ' + val)",
    ]
});

/// A random program of `count` instructions drawn from the template pool.
pub fn random_program(count: usize, mem_size: usize) -> Vec<Instruction> {
    let mut rng = rand::rng();
    let mut program = Vec::with_capacity(count);
    for _ in 0..count {
        let template = TEMPLATE_POOL[rng.random_range(0..TEMPLATE_POOL.len())];
        let line = if template.contains("%ADDR%") {
            template.replace("%ADDR%", &rng.random_range(0..mem_size).to_string())
        } else {
            template.to_string()
        };
        match parse_line(&line) {
            Ok(instruction) => program.push(instruction),
            Err(err) => log::warn!("skipping template instruction: {err}"),
        }
    }
    program
}

/// Uniform instruction count within the configured range.
pub fn random_instruction_count(config: &SystemConfig) -> usize {
    rand::rng().random_range(config.min_ins..=config.max_ins)
}

/// A random power-of-two memory size within the configured per-process
/// range, so generated processes pass the same validation as user ones.
/// Falls back to the minimum when the range contains no power of two.
pub fn random_memory_size(config: &SystemConfig) -> usize {
    let mut sizes = Vec::new();
    let mut size = config.min_mem_per_proc.next_power_of_two();
    while size <= config.max_mem_per_proc {
        sizes.push(size);
        size <<= 1;
    }
    if sizes.is_empty() {
        return config.min_mem_per_proc;
    }
    sizes[rand::rng().random_range(0..sizes.len())]
}
