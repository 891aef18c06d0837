//! `config.txt` loading: whitespace-separated `key value` pairs, defaults
//! generated when the file is missing and regenerated when its contents are
//! unusable.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use types::{SchedulerPolicy, SystemConfig};

pub fn generate_default(path: &Path) -> Result<()> {
    let config = SystemConfig::default();
    let contents = format!(
        "num-cpu {}\n\
         scheduler {}\n\
         quantum-cycles {}\n\
         batch-process-freq {}\n\
         min-ins {}\n\
         max-ins {}\n\
         delays-per-exec {}\n\
         max-overall-mem {}\n\
         mem-per-frame {}\n\
         min-mem-per-proc {}\n\
         max-mem-per-proc {}\n",
        config.num_cpu,
        config.scheduler.as_str(),
        config.quantum_cycles,
        config.batch_process_freq,
        config.min_ins,
        config.max_ins,
        config.delays_per_exec,
        config.max_overall_mem,
        config.mem_per_frame,
        config.min_mem_per_proc,
        config.max_mem_per_proc,
    );
    fs::write(path, contents).with_context(|| format!("could not create {}", path.display()))?;
    println!("Default {} generated with safe defaults.", path.display());
    Ok(())
}

pub fn load(path: &Path) -> Result<SystemConfig> {
    if !path.exists() {
        println!("Warning: {} not found.", path.display());
        println!("Creating default configuration file...");
        generate_default(path)?;
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("could not read {}", path.display()))?;
    let mut config = SystemConfig::default();

    let mut tokens = contents.split_whitespace();
    while let Some(key) = tokens.next() {
        let Some(value) = tokens.next() else {
            println!("Warning: key '{key}' has no value; keeping default.");
            break;
        };
        match key {
            "num-cpu" => set(&mut config.num_cpu, key, value),
            "scheduler" => match SchedulerPolicy::parse(value) {
                Some(policy) => config.scheduler = policy,
                None => {
                    println!(
                        "Warning: Unsupported scheduler '{value}'. Defaulting to round-robin."
                    );
                    config.scheduler = SchedulerPolicy::RoundRobin;
                }
            },
            "quantum-cycles" => set(&mut config.quantum_cycles, key, value),
            "batch-process-freq" => set(&mut config.batch_process_freq, key, value),
            "min-ins" => set(&mut config.min_ins, key, value),
            "max-ins" => set(&mut config.max_ins, key, value),
            "delays-per-exec" => set(&mut config.delays_per_exec, key, value),
            "max-overall-mem" => set(&mut config.max_overall_mem, key, value),
            "mem-per-frame" => set(&mut config.mem_per_frame, key, value),
            "min-mem-per-proc" => set(&mut config.min_mem_per_proc, key, value),
            "max-mem-per-proc" => set(&mut config.max_mem_per_proc, key, value),
            _ => println!("Warning: unknown config key '{key}' ignored."),
        }
    }

    if !config.is_valid() {
        println!("Invalid config. Regenerating defaults.");
        generate_default(path)?;
        return Ok(SystemConfig::default());
    }
    Ok(config)
}

fn set<T: std::str::FromStr>(slot: &mut T, key: &str, value: &str) {
    match value.parse() {
        Ok(parsed) => *slot = parsed,
        Err(_) => println!("Warning: invalid value '{value}' for '{key}'; keeping default."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_config(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("config-{}-{}.txt", tag, std::process::id()))
    }

    #[test]
    fn missing_file_is_generated_with_defaults() {
        let path = temp_config("missing");
        let _ = fs::remove_file(&path);
        let config = load(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.num_cpu, SystemConfig::default().num_cpu);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn values_override_defaults() {
        let path = temp_config("values");
        fs::write(&path, "num-cpu 2\nscheduler fcfs\nquantum-cycles 9\n").unwrap();
        let config = load(&path).unwrap();
        assert_eq!(config.num_cpu, 2);
        assert_eq!(config.scheduler, SchedulerPolicy::Fcfs);
        assert_eq!(config.quantum_cycles, 9);
        // Unspecified keys keep their defaults.
        assert_eq!(config.mem_per_frame, SystemConfig::default().mem_per_frame);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn unsupported_scheduler_falls_back_to_round_robin() {
        let path = temp_config("fallback");
        fs::write(&path, "scheduler lottery\n").unwrap();
        let config = load(&path).unwrap();
        assert_eq!(config.scheduler, SchedulerPolicy::RoundRobin);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn unusable_config_is_regenerated() {
        let path = temp_config("invalid");
        fs::write(&path, "num-cpu 0\n").unwrap();
        let config = load(&path).unwrap();
        assert_eq!(config.num_cpu, SystemConfig::default().num_cpu);
        let regenerated = fs::read_to_string(&path).unwrap();
        assert!(regenerated.contains("num-cpu 4"));
        let _ = fs::remove_file(&path);
    }
}
