mod common;

use std::collections::BTreeMap;
use std::path::Path;

use market_equilibrium::config::ScenarioConfig;
use market_equilibrium::io::trace::{TraceMetadata, read_trace, write_key, write_trace};
use market_equilibrium::runner::run_scenario;
use market_equilibrium::sim::marketplace::MarketId;
use market_equilibrium::sim::trace::TraceVariable;

use common::run_preset;

#[test]
fn every_preset_solves_every_period() {
    for &name in ScenarioConfig::PRESETS {
        let run = run_preset(name);
        assert_eq!(run.outcomes.len(), run.calendar.period_count(), "{name}");
        for (period, outcome) in run.outcomes.iter().enumerate() {
            assert_eq!(outcome.period, period);
            assert_eq!(Some(outcome.year), run.calendar.period_to_year(period));
            assert!(outcome.prices.iter().all(|p| p.is_finite() && *p >= 0.0));
        }
        assert!(run.trace.is_group_sorted(), "{name} trace out of order");
    }
}

#[test]
fn baseline_converges_everywhere() {
    let run = run_preset("baseline");
    assert!(run.summary.all_converged(), "{}", run.summary);
    for outcome in &run.outcomes {
        assert!(outcome.residual < 1e-8, "{outcome}");
    }
}

#[test]
fn runs_are_deterministic() {
    let a = run_preset("baseline");
    let b = run_preset("baseline");
    assert_eq!(a.trace.rows(), b.trace.rows());
    assert_eq!(a.outcomes, b.outcomes);
}

#[test]
fn scenario_files_match_presets() {
    for &name in ScenarioConfig::PRESETS {
        let path = format!("scenarios/{name}.toml");
        let from_file = ScenarioConfig::from_toml_file(Path::new(&path))
            .unwrap_or_else(|e| panic!("{path}: {e}"));
        let file_run = run_scenario(&from_file).expect("file scenario runs");
        let preset_run = run_preset(name);
        assert_eq!(file_run.outcomes, preset_run.outcomes, "{name}");
    }
}

#[test]
fn every_iteration_traces_every_market_and_variable() {
    let run = run_preset("fixed_carbon");
    let markets = run.marketplace.len();
    let mut per_period: BTreeMap<usize, usize> = BTreeMap::new();
    for row in run.trace.rows() {
        *per_period.entry(row.period).or_default() += 1;
    }
    for period in run.calendar.periods() {
        let iterations = run.trace.last_iteration(period).expect("period traced") + 1;
        assert_eq!(
            per_period.get(&period).copied(),
            Some(iterations * markets * TraceVariable::ALL.len())
        );
    }
}

#[test]
fn fixed_market_keeps_its_price_and_is_traced() {
    let run = run_preset("fixed_carbon");
    let carbon = run.marketplace.market_id("carbon", "global").expect("carbon market");
    for outcome in &run.outcomes {
        assert_eq!(outcome.prices[carbon.0], 25.0);
    }
    let rows: Vec<_> = run.trace.rows().iter().filter(|r| r.mktid == carbon).collect();
    assert!(!rows.is_empty());
    assert!(rows.iter().all(|r| !r.solvable));
    assert!(
        rows.iter()
            .filter(|r| r.variable == TraceVariable::Deltax)
            .all(|r| r.value == 0.0)
    );
}

#[test]
fn carbon_market_pulls_gas_demand_down() {
    let baseline = run_preset("baseline");
    let carbon = run_preset("fixed_carbon");
    let gas = MarketId(1);
    assert!(carbon.outcomes[0].prices[gas.0] < baseline.outcomes[0].prices[gas.0]);
    let emitting: Vec<_> = carbon
        .technologies
        .iter()
        .filter(|t| t.carbon_content.is_some_and(|c| c > 0.0))
        .collect();
    assert!(!emitting.is_empty());
}

#[test]
fn later_periods_start_from_previous_solution() {
    let run = run_preset("baseline");
    let oil = MarketId(0);
    let first_price = run
        .trace
        .group(1, TraceVariable::Price)
        .find(|r| r.mktid == oil && r.iter == 0)
        .map(|r| r.value);
    assert_eq!(first_price, Some(run.outcomes[0].prices[oil.0]));
}

#[test]
fn exported_trace_reads_back() {
    let run = run_preset("baseline");
    let metadata = TraceMetadata {
        scenario: run.name.clone(),
        periods: run.calendar.period_count(),
        markets: run.marketplace.len(),
        strategy: "newton".to_string(),
    };
    let mut buf = Vec::new();
    write_trace(run.trace.rows(), &metadata, &mut buf).expect("trace written");
    let text = String::from_utf8(buf).expect("utf-8");
    assert!(text.starts_with("# market-equilibrium solver trace\n# scenario=baseline"));
    let parsed = read_trace(text.as_bytes()).expect("trace parses");
    assert_eq!(parsed.len(), run.trace.len());

    let mut key = Vec::new();
    write_key(&run.marketplace, &mut key).expect("key written");
    let key = String::from_utf8(key).expect("utf-8");
    assert_eq!(
        key.lines().count(),
        1 + run.calendar.period_count() * run.marketplace.len()
    );
    assert!(key.lines().any(|l| l == "0,2,global:electricity"));
}

#[test]
fn linear_market_hits_closed_form_equilibrium() {
    let run = run_scenario(&common::linear_market(2.0, 12.0, 1.0, 1.0)).expect("runs");
    for outcome in &run.outcomes {
        assert!((outcome.prices[0] - 4.0).abs() < 1e-6, "{outcome}");
    }
}
