//! Command-line argument parsing.

use std::env;
use std::path::PathBuf;

/// Preset used when neither `--scenario` nor `--preset` is given.
pub const DEFAULT_PRESET: &str = "baseline";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Run(CliOptions),
    Help,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CliOptions {
    pub scenario: Option<PathBuf>,
    pub preset: Option<String>,
    pub seed: Option<u64>,
    pub trace_out: Option<PathBuf>,
    pub key_out: Option<PathBuf>,
    #[cfg(feature = "api")]
    pub serve: bool,
    #[cfg(feature = "api")]
    pub port: u16,
}

pub fn parse_args() -> Result<Command, String> {
    let args: Vec<String> = env::args().skip(1).collect();
    parse_args_from(args)
}

/// Parses arguments without the program name.
///
/// # Errors
///
/// Returns a message for unknown flags, missing or malformed values, and
/// repeated or conflicting options.
pub fn parse_args_from(args: Vec<String>) -> Result<Command, String> {
    let mut i = 0usize;
    let mut scenario = None;
    let mut preset = None;
    let mut seed = None;
    let mut trace_out = None;
    let mut key_out = None;
    #[cfg(feature = "api")]
    let mut serve = false;
    #[cfg(feature = "api")]
    let mut port = 3000u16;

    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => return Ok(Command::Help),
            "--scenario" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --scenario (expected a TOML file path)")?;
                if scenario.replace(PathBuf::from(path)).is_some() {
                    return Err("--scenario provided more than once".to_string());
                }
            }
            "--preset" => {
                i += 1;
                let name = args.next_or_err(i, "missing value for --preset (expected a preset name)")?;
                if preset.replace(name.to_string()).is_some() {
                    return Err("--preset provided more than once".to_string());
                }
            }
            "--seed" => {
                i += 1;
                let value = args.next_or_err(i, "missing value for --seed (expected a u64)")?;
                let parsed = value
                    .parse::<u64>()
                    .map_err(|_| format!("--seed value \"{value}\" is not a valid u64"))?;
                seed = Some(parsed);
            }
            "--trace-out" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --trace-out (expected a file path)")?;
                if trace_out.replace(PathBuf::from(path)).is_some() {
                    return Err("--trace-out provided more than once".to_string());
                }
            }
            "--key-out" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --key-out (expected a file path)")?;
                if key_out.replace(PathBuf::from(path)).is_some() {
                    return Err("--key-out provided more than once".to_string());
                }
            }
            #[cfg(feature = "api")]
            "--serve" => serve = true,
            #[cfg(feature = "api")]
            "--port" => {
                i += 1;
                let value = args.next_or_err(i, "missing value for --port (expected a u16)")?;
                port = value
                    .parse::<u16>()
                    .map_err(|_| format!("--port value \"{value}\" is not a valid u16"))?;
            }
            other => return Err(format!("unknown argument: {other}")),
        }
        i += 1;
    }

    if scenario.is_some() && preset.is_some() {
        return Err(
            "arguments `--scenario` and `--preset` are mutually exclusive; choose one source"
                .to_string(),
        );
    }

    if scenario.is_none() && preset.is_none() {
        preset = Some(DEFAULT_PRESET.to_string());
    }

    Ok(Command::Run(CliOptions {
        scenario,
        preset,
        seed,
        trace_out,
        key_out,
        #[cfg(feature = "api")]
        serve,
        #[cfg(feature = "api")]
        port,
    }))
}

trait SliceArgExt {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String>;
}

impl SliceArgExt for [String] {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String> {
        self.get(index)
            .map(String::as_str)
            .ok_or_else(|| err.to_string())
    }
}

pub fn print_usage() {
    eprintln!("market-equilibrium: multi-period market equilibrium solver");
    eprintln!();
    eprintln!("Usage: market-equilibrium [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario <path>        Load scenario from TOML config file");
    eprintln!("  --preset <name>          Use a built-in preset (baseline, fixed_carbon, stress)");
    eprintln!("  --seed <u64>             Override the restart seed");
    eprintln!("  --trace-out <path>       Write the solver trace to CSV");
    eprintln!("  --key-out <path>         Write the market key to CSV");
    #[cfg(feature = "api")]
    {
        eprintln!("  --serve                  Start REST API server after solving");
        eprintln!("  --port <u16>             API server port (default: 3000)");
    }
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("If no --scenario or --preset is given, the baseline preset is used.");
}
