//! Shared fixtures for integration tests.

#![allow(dead_code)]

use market_equilibrium::config::{
    CrossPriceConfig, DemandConfig, MarketConfig, ScenarioConfig, SupplyConfig,
};
use market_equilibrium::runner::{ScenarioRun, run_scenario};
use market_equilibrium::sim::calendar::CalendarConfig;
use market_equilibrium::sim::types::SolverConfig;

/// Runs a built-in preset, panicking with the error on failure.
pub fn run_preset(name: &str) -> ScenarioRun {
    let config = ScenarioConfig::from_preset(name).expect("preset exists");
    run_scenario(&config).unwrap_or_else(|e| panic!("preset {name} failed: {e}"))
}

pub fn market(name: &str, initial_price: f64) -> MarketConfig {
    MarketConfig {
        name: name.to_string(),
        region: "global".to_string(),
        initial_price,
        solvable: true,
        co2_coefficient: None,
    }
}

/// Single market with supply `a * p` and demand `b - c * p`.
pub fn linear_market(a: f64, b: f64, c: f64, initial_price: f64) -> ScenarioConfig {
    ScenarioConfig {
        name: "linear".to_string(),
        calendar: CalendarConfig::default(),
        solver: SolverConfig::default(),
        markets: vec![market("good", initial_price)],
        supplies: vec![SupplyConfig {
            market: "good".to_string(),
            region: "global".to_string(),
            intercept: 0.0,
            slope: a,
        }],
        demands: vec![DemandConfig {
            market: "good".to_string(),
            region: "global".to_string(),
            intercept: b,
            slope: c,
            cross: Vec::<CrossPriceConfig>::new(),
        }],
        technologies: Vec::new(),
    }
}
