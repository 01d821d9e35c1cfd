//! Solver entry point: CLI wiring, scenario loading and output export.

use std::process;

use tracing_subscriber::EnvFilter;

use market_equilibrium::cli::{self, CliOptions, Command};
use market_equilibrium::config::ScenarioConfig;
use market_equilibrium::error::ScenarioError;
use market_equilibrium::io::trace::{TraceMetadata, export_key, export_trace};
use market_equilibrium::runner::{ScenarioRun, run_scenario};

fn load_config(cli: &CliOptions) -> Result<ScenarioConfig, String> {
    let mut scenario = match (&cli.scenario, &cli.preset) {
        (Some(path), _) => ScenarioConfig::from_toml_file(path).map_err(|e| e.to_string())?,
        (None, Some(name)) => ScenarioConfig::from_preset(name).map_err(|e| e.to_string())?,
        (None, None) => ScenarioConfig::baseline(),
    };
    if let Some(seed) = cli.seed {
        scenario.solver.seed = seed;
    }
    Ok(scenario)
}

fn write_outputs(cli: &CliOptions, run: &ScenarioRun, scenario: &ScenarioConfig) -> Result<(), ScenarioError> {
    if let Some(ref path) = cli.trace_out {
        let metadata = TraceMetadata {
            scenario: run.name.clone(),
            periods: run.calendar.period_count(),
            markets: run.marketplace.len(),
            strategy: scenario.solver.strategy.to_string(),
        };
        export_trace(run.trace.rows(), &metadata, path)?;
        eprintln!("Trace written to {}", path.display());
    }

    if let Some(ref path) = cli.key_out {
        export_key(&run.marketplace, path)?;
        eprintln!("Market key written to {}", path.display());
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = match cli::parse_args() {
        Ok(Command::Run(opts)) => opts,
        Ok(Command::Help) => {
            cli::print_usage();
            return;
        }
        Err(e) => {
            eprintln!("error: {e}");
            cli::print_usage();
            process::exit(2);
        }
    };

    let scenario = load_config(&cli).unwrap_or_else(|e| {
        eprintln!("{e}");
        process::exit(1);
    });

    let run = match run_scenario(&scenario) {
        Ok(run) => run,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    for outcome in &run.outcomes {
        println!("{outcome}");
    }
    println!("\n{}", run.summary);

    if let Err(e) = write_outputs(&cli, &run, &scenario) {
        eprintln!("error: {e}");
        process::exit(1);
    }

    #[cfg(feature = "api")]
    if cli.serve {
        use std::net::SocketAddr;
        use std::sync::Arc;

        let state = Arc::new(market_equilibrium::api::AppState::from(run));
        let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
        let rt = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
            eprintln!("error: failed to create tokio runtime: {e}");
            process::exit(1);
        });
        if let Err(e) = rt.block_on(market_equilibrium::api::serve(state, addr)) {
            eprintln!("error: API server failed: {e}");
            process::exit(1);
        }
    }
}
