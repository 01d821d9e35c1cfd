//! TOML-based scenario configuration and preset definitions.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::contributors::Coefficient;
use crate::error::CalendarError;
use crate::sim::calendar::CalendarConfig;
use crate::sim::types::{SolverConfig, StrategyKind};

/// Region used when a market reference does not name one.
pub const DEFAULT_REGION: &str = "global";

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_one() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

/// Top-level scenario configuration parsed from TOML.
///
/// Calendar and solver sections fall back to their defaults; markets and
/// their contributors must be listed. Load from TOML with
/// [`ScenarioConfig::from_toml_file`] or use a built-in preset.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Scenario name, copied into the trace preamble.
    #[serde(default = "ScenarioConfig::default_name")]
    pub name: String,
    /// Period calendar inputs.
    #[serde(default)]
    pub calendar: CalendarConfig,
    /// Solver settings.
    #[serde(default)]
    pub solver: SolverConfig,
    /// Markets, in id order.
    #[serde(default)]
    pub markets: Vec<MarketConfig>,
    /// Linear supply curves.
    #[serde(default)]
    pub supplies: Vec<SupplyConfig>,
    /// Linear demand curves.
    #[serde(default)]
    pub demands: Vec<DemandConfig>,
    /// Technologies buying one input each.
    #[serde(default)]
    pub technologies: Vec<TechnologyConfig>,
}

/// One market.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarketConfig {
    pub name: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Starting price in every period (fixed price when not solvable).
    #[serde(default = "default_one")]
    pub initial_price: f64,
    /// `false` pins the price; the market is still traced.
    #[serde(default = "default_true")]
    pub solvable: bool,
    /// CO2 emitted per unit of the good consumed.
    #[serde(default)]
    pub co2_coefficient: Option<f64>,
}

/// Reference to a market by name and region.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrossPriceConfig {
    pub market: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Quantity gained per unit of that market's price.
    pub coefficient: f64,
}

/// Linear supply curve `max(0, intercept + slope * p)`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupplyConfig {
    pub market: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub intercept: f64,
    /// Must be >= 0.
    pub slope: f64,
}

/// Linear demand curve `max(0, intercept - slope * p + cross terms)`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DemandConfig {
    pub market: String,
    #[serde(default = "default_region")]
    pub region: String,
    pub intercept: f64,
    /// Must be >= 0.
    pub slope: f64,
    #[serde(default)]
    pub cross: Vec<CrossPriceConfig>,
}

/// A technology and its vintages.
///
/// The top-level `coefficient`, `calibration` and `fixed_output` describe the
/// base-period vintage. Later periods clone the previous vintage forward
/// unless a `[[technologies.vintages]]` entry names their year.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TechnologyConfig {
    pub name: String,
    pub sector: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Market the technology's input is bought from.
    pub input: String,
    /// Output at the reference price.
    pub base_output: f64,
    #[serde(default)]
    pub price_elasticity: f64,
    #[serde(default = "default_one")]
    pub reference_price: f64,
    #[serde(default)]
    pub income_elasticity: f64,
    /// Annual rate of coefficient improvement.
    #[serde(default)]
    pub tech_change: Option<f64>,
    #[serde(default = "default_one")]
    pub price_unit_conversion: f64,
    #[serde(default)]
    pub coefficient: Option<Coefficient>,
    #[serde(default)]
    pub calibration: Option<f64>,
    #[serde(default)]
    pub fixed_output: Option<f64>,
    #[serde(default)]
    pub vintages: Vec<VintageConfig>,
}

/// Explicit vintage for the period containing `year`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VintageConfig {
    pub year: i32,
    #[serde(default)]
    pub coefficient: Option<Coefficient>,
    #[serde(default)]
    pub calibration: Option<f64>,
    #[serde(default)]
    pub fixed_output: Option<f64>,
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"solver.tolerance"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl From<CalendarError> for ConfigError {
    fn from(err: CalendarError) -> Self {
        match err {
            CalendarError::Configuration { field, message } => {
                Self::new(format!("calendar.{field}"), message)
            }
            other => Self::new("calendar", other.to_string()),
        }
    }
}

fn market(name: &str, initial_price: f64) -> MarketConfig {
    MarketConfig {
        name: name.to_string(),
        region: default_region(),
        initial_price,
        solvable: true,
        co2_coefficient: None,
    }
}

fn supply(market: &str, intercept: f64, slope: f64) -> SupplyConfig {
    SupplyConfig {
        market: market.to_string(),
        region: default_region(),
        intercept,
        slope,
    }
}

fn demand(market: &str, intercept: f64, slope: f64, cross: &[(&str, f64)]) -> DemandConfig {
    DemandConfig {
        market: market.to_string(),
        region: default_region(),
        intercept,
        slope,
        cross: cross
            .iter()
            .map(|&(m, coefficient)| CrossPriceConfig {
                market: m.to_string(),
                region: default_region(),
                coefficient,
            })
            .collect(),
    }
}

impl ScenarioConfig {
    fn default_name() -> String {
        "scenario".to_string()
    }

    /// Three interlinked fuel markets with two technologies.
    pub fn baseline() -> Self {
        Self {
            name: "baseline".to_string(),
            calendar: CalendarConfig::default(),
            solver: SolverConfig::default(),
            markets: vec![market("oil", 4.0), market("gas", 3.0), market("electricity", 8.0)],
            supplies: vec![
                supply("oil", 10.0, 5.0),
                supply("gas", 5.0, 8.0),
                supply("electricity", 0.0, 6.0),
            ],
            demands: vec![
                demand("oil", 80.0, 4.0, &[("gas", 1.0)]),
                demand("gas", 30.0, 2.0, &[("oil", 0.5)]),
                demand("electricity", 100.0, 3.0, &[("gas", 0.5)]),
            ],
            technologies: vec![
                TechnologyConfig {
                    name: "gas turbine".to_string(),
                    sector: "electricity".to_string(),
                    region: default_region(),
                    input: "gas".to_string(),
                    base_output: 20.0,
                    price_elasticity: 0.3,
                    reference_price: 3.0,
                    income_elasticity: 0.0,
                    tech_change: Some(0.005),
                    price_unit_conversion: 1.0,
                    coefficient: Some(Coefficient::Efficiency(0.45)),
                    calibration: None,
                    fixed_output: None,
                    vintages: vec![VintageConfig {
                        year: 2020,
                        coefficient: Some(Coefficient::Efficiency(0.5)),
                        calibration: None,
                        fixed_output: None,
                    }],
                },
                TechnologyConfig {
                    name: "oil boiler".to_string(),
                    sector: "buildings".to_string(),
                    region: default_region(),
                    input: "oil".to_string(),
                    base_output: 8.0,
                    price_elasticity: 0.2,
                    reference_price: 4.0,
                    income_elasticity: 0.0,
                    tech_change: Some(0.01),
                    price_unit_conversion: 1.0,
                    coefficient: Some(Coefficient::Intensity(1.2)),
                    calibration: Some(10.0),
                    fixed_output: None,
                    vintages: Vec::new(),
                },
            ],
        }
    }

    /// Baseline plus a carbon market whose price is pinned.
    pub fn fixed_carbon() -> Self {
        let mut cfg = Self::baseline();
        cfg.name = "fixed_carbon".to_string();
        for m in &mut cfg.markets {
            m.co2_coefficient = match m.name.as_str() {
                "oil" => Some(0.07),
                "gas" => Some(0.05),
                _ => None,
            };
        }
        cfg.markets.push(MarketConfig {
            solvable: false,
            ..market("carbon", 25.0)
        });
        cfg.demands.push(demand("carbon", 50.0, 1.0, &[]));
        if let Some(gas) = cfg.demands.iter_mut().find(|d| d.market == "gas") {
            gas.cross.push(CrossPriceConfig {
                market: "carbon".to_string(),
                region: default_region(),
                coefficient: -0.2,
            });
        }
        cfg
    }

    /// Uneven calendar, distant starting prices and the bisection strategy.
    pub fn stress() -> Self {
        let mut cfg = Self::baseline();
        cfg.name = "stress".to_string();
        cfg.calendar.time_step1 = 7;
        cfg.solver = SolverConfig {
            strategy: StrategyKind::Bisection,
            max_iterations: 250,
            ..SolverConfig::default()
        };
        for m in &mut cfg.markets {
            m.initial_price *= 50.0;
        }
        cfg
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "fixed_carbon", "stress"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "fixed_carbon" => Ok(Self::fixed_carbon()),
            "stress" => Ok(Self::stress()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if let Err(calendar_errors) = self.calendar.validate() {
            errors.extend(calendar_errors.into_iter().map(ConfigError::from));
        }

        self.validate_solver(&mut errors);

        if self.markets.is_empty() {
            errors.push(ConfigError::new("markets", "at least one market is required"));
        }
        let mut known = HashSet::new();
        for (i, m) in self.markets.iter().enumerate() {
            if !known.insert((m.name.as_str(), m.region.as_str())) {
                errors.push(ConfigError::new(
                    format!("markets[{i}].name"),
                    format!("duplicate market \"{}\" in region \"{}\"", m.name, m.region),
                ));
            }
            if !m.initial_price.is_finite() || m.initial_price < 0.0 {
                errors.push(ConfigError::new(
                    format!("markets[{i}].initial_price"),
                    "must be finite and >= 0",
                ));
            }
            if m.co2_coefficient.is_some_and(|c| !non_negative(c)) {
                errors.push(ConfigError::new(
                    format!("markets[{i}].co2_coefficient"),
                    "must be >= 0",
                ));
            }
        }

        let mut check_market = |field: String, name: &str, region: &str| {
            if !known.contains(&(name, region)) {
                errors.push(ConfigError::new(
                    field,
                    format!("unknown market \"{name}\" in region \"{region}\""),
                ));
            }
        };
        for (i, s) in self.supplies.iter().enumerate() {
            check_market(format!("supplies[{i}].market"), &s.market, &s.region);
        }
        for (i, d) in self.demands.iter().enumerate() {
            check_market(format!("demands[{i}].market"), &d.market, &d.region);
            for (j, c) in d.cross.iter().enumerate() {
                check_market(format!("demands[{i}].cross[{j}].market"), &c.market, &c.region);
            }
        }

        for (i, s) in self.supplies.iter().enumerate() {
            check_finite(format!("supplies[{i}].intercept"), s.intercept, &mut errors);
            if !non_negative(s.slope) {
                errors.push(ConfigError::new(format!("supplies[{i}].slope"), "must be >= 0"));
            }
        }
        for (i, d) in self.demands.iter().enumerate() {
            check_finite(format!("demands[{i}].intercept"), d.intercept, &mut errors);
            if !non_negative(d.slope) {
                errors.push(ConfigError::new(format!("demands[{i}].slope"), "must be >= 0"));
            }
            for (j, c) in d.cross.iter().enumerate() {
                check_finite(format!("demands[{i}].cross[{j}].coefficient"), c.coefficient, &mut errors);
            }
        }

        for (i, t) in self.technologies.iter().enumerate() {
            self.validate_technology(i, t, &mut errors);
        }

        errors
    }

    fn validate_solver(&self, errors: &mut Vec<ConfigError>) {
        let s = &self.solver;
        if s.max_iterations == 0 {
            errors.push(ConfigError::new("solver.max_iterations", "must be > 0"));
        }
        if !positive(s.tolerance) {
            errors.push(ConfigError::new("solver.tolerance", "must be > 0"));
        }
        if s.step_tolerance.is_some_and(|t| !positive(t)) {
            errors.push(ConfigError::new("solver.step_tolerance", "must be > 0 when set"));
        }
        if !positive(s.fd_step) {
            errors.push(ConfigError::new("solver.fd_step", "must be > 0"));
        }
        if !non_negative(s.min_derivative) {
            errors.push(ConfigError::new("solver.min_derivative", "must be >= 0"));
        }
        if !(positive(s.fallback_fraction) && s.fallback_fraction <= 1.0) {
            errors.push(ConfigError::new("solver.fallback_fraction", "must be in (0.0, 1.0]"));
        }
        if !non_negative(s.trivial_threshold) {
            errors.push(ConfigError::new("solver.trivial_threshold", "must be >= 0"));
        }
    }

    fn validate_technology(&self, i: usize, t: &TechnologyConfig, errors: &mut Vec<ConfigError>) {
        let prefix = format!("technologies[{i}]");
        check_quantity(format!("{prefix}.base_output"), Some(t.base_output), errors);
        if !positive(t.reference_price) {
            errors.push(ConfigError::new(format!("{prefix}.reference_price"), "must be > 0"));
        }
        check_finite(format!("{prefix}.price_elasticity"), t.price_elasticity, errors);
        check_finite(format!("{prefix}.income_elasticity"), t.income_elasticity, errors);
        if let Some(rate) = t.tech_change {
            check_finite(format!("{prefix}.tech_change"), rate, errors);
        }
        check_finite(format!("{prefix}.price_unit_conversion"), t.price_unit_conversion, errors);
        check_quantity(format!("{prefix}.fixed_output"), t.fixed_output, errors);
        check_quantity(format!("{prefix}.calibration"), t.calibration, errors);
        if let Some(c) = t.coefficient {
            check_coefficient(format!("{prefix}.coefficient"), c, errors);
        }

        let cal = &self.calendar;
        let mut years = HashSet::new();
        for (j, v) in t.vintages.iter().enumerate() {
            let field = format!("{prefix}.vintages[{j}]");
            if v.year <= cal.start_year || v.year > cal.end_year {
                errors.push(ConfigError::new(
                    format!("{field}.year"),
                    format!("must be in ({}, {}]", cal.start_year, cal.end_year),
                ));
            }
            if !years.insert(v.year) {
                errors.push(ConfigError::new(format!("{field}.year"), "duplicate vintage year"));
            }
            if let Some(c) = v.coefficient {
                check_coefficient(format!("{field}.coefficient"), c, errors);
            }
            check_quantity(format!("{field}.fixed_output"), v.fixed_output, errors);
            check_quantity(format!("{field}.calibration"), v.calibration, errors);
        }
    }
}

/// `false` for NaN.
fn positive(x: f64) -> bool {
    x > 0.0
}

fn non_negative(x: f64) -> bool {
    x >= 0.0
}

fn check_finite(field: String, value: f64, errors: &mut Vec<ConfigError>) {
    if !value.is_finite() {
        errors.push(ConfigError::new(field, "must be finite"));
    }
}

fn check_quantity(field: String, quantity: Option<f64>, errors: &mut Vec<ConfigError>) {
    if quantity.is_some_and(|q| !q.is_finite() || q < 0.0) {
        errors.push(ConfigError::new(field, "must be finite and >= 0"));
    }
}

fn check_coefficient(field: String, coefficient: Coefficient, errors: &mut Vec<ConfigError>) {
    let value = match coefficient {
        Coefficient::Efficiency(v) | Coefficient::Intensity(v) => v,
    };
    if !positive(value) || !value.is_finite() {
        errors.push(ConfigError::new(field, "must be finite and > 0"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_preset_valid() {
        let cfg = ScenarioConfig::baseline();
        let errors = cfg.validate();
        assert!(errors.is_empty(), "baseline should be valid: {errors:?}");
    }

    #[test]
    fn from_preset_unknown() {
        let err = ScenarioConfig::from_preset("nonexistent");
        assert!(err.is_err());
        assert!(err.err().is_some_and(|e| e.message.contains("unknown preset")));
    }

    #[test]
    fn all_presets_are_valid() {
        for name in ScenarioConfig::PRESETS {
            let cfg = ScenarioConfig::from_preset(name);
            assert!(cfg.is_ok(), "preset \"{name}\" should load");
            let errors = cfg.as_ref().map(|c| c.validate()).unwrap_or_default();
            assert!(errors.is_empty(), "preset \"{name}\" should be valid: {errors:?}");
        }
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
name = "two goods"

[calendar]
start_year = 2000
inter_year1 = 2010
inter_year2 = 2030
end_year = 2050
time_step1 = 5
time_step2 = 10
time_step3 = 20
data_end_year = 2050
data_time_step = 5

[solver]
max_iterations = 50
strategy = "bisection"

[[markets]]
name = "gas"
region = "USA"
initial_price = 2.5

[[markets]]
name = "carbon"
region = "USA"
solvable = false

[[supplies]]
market = "gas"
region = "USA"
slope = 3.0

[[demands]]
market = "gas"
region = "USA"
intercept = 20.0
slope = 1.0
cross = [{ market = "carbon", region = "USA", coefficient = -0.1 }]

[[technologies]]
name = "ngcc"
sector = "electricity"
region = "USA"
input = "gas"
base_output = 5.0
coefficient = { efficiency = 0.55 }

[[technologies.vintages]]
year = 2020
coefficient = { intensity = 1.6 }
"#;
        let cfg = ScenarioConfig::from_toml_str(toml);
        assert!(cfg.is_ok(), "valid TOML should parse: {:?}", cfg.err());
        let cfg = cfg.ok();
        assert_eq!(cfg.as_ref().map(|c| c.markets.len()), Some(2));
        assert_eq!(cfg.as_ref().map(|c| c.solver.strategy), Some(StrategyKind::Bisection));
        assert_eq!(
            cfg.as_ref().and_then(|c| c.technologies[0].coefficient),
            Some(Coefficient::Efficiency(0.55))
        );
        assert_eq!(
            cfg.as_ref().map(|c| c.technologies[0].vintages[0].year),
            Some(2020)
        );
        let errors = cfg.map(|c| c.validate()).unwrap_or_default();
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let toml = r#"
[solver]
max_iterations = 10
bogus_field = true
"#;
        assert!(ScenarioConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let toml = r#"
[[markets]]
name = "wheat"
"#;
        let cfg = ScenarioConfig::from_toml_str(toml).ok();
        assert_eq!(cfg.as_ref().map(|c| c.calendar.start_year), Some(2005));
        assert_eq!(cfg.as_ref().map(|c| c.markets[0].region.as_str()), Some("global"));
        assert_eq!(cfg.as_ref().map(|c| c.markets[0].solvable), Some(true));
        assert_eq!(cfg.map(|c| c.solver.max_iterations), Some(100));
    }

    #[test]
    fn validation_reports_calendar_errors_with_path() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.calendar.time_step2 = 0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "calendar.time_step2"));
    }

    #[test]
    fn validation_catches_unknown_market_reference() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.demands[0].cross.push(CrossPriceConfig {
            market: "coal".into(),
            region: default_region(),
            coefficient: 1.0,
        });
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "demands[0].cross[1].market"));
    }

    #[test]
    fn validation_catches_duplicate_market() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.markets.push(market("oil", 1.0));
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "markets[3].name"));
    }

    #[test]
    fn validation_catches_bad_solver_settings() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.solver.max_iterations = 0;
        cfg.solver.tolerance = -1.0;
        cfg.solver.fallback_fraction = 2.0;
        let fields: Vec<String> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"solver.max_iterations".to_string()));
        assert!(fields.contains(&"solver.tolerance".to_string()));
        assert!(fields.contains(&"solver.fallback_fraction".to_string()));
    }

    #[test]
    fn validation_catches_vintage_outside_calendar() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.technologies[0].vintages.push(VintageConfig {
            year: 2005,
            coefficient: None,
            calibration: None,
            fixed_output: None,
        });
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "technologies[0].vintages[1].year"));
    }

    #[test]
    fn validation_requires_markets() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.markets.clear();
        cfg.supplies.clear();
        cfg.demands.clear();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "markets"));
    }

    #[test]
    fn validation_rejects_nan_slope() {
        let toml = r#"
[[markets]]
name = "gas"
initial_price = 1.0

[[supplies]]
market = "gas"
slope = nan

[[demands]]
market = "gas"
intercept = 10.0
slope = 1.0
"#;
        let cfg = ScenarioConfig::from_toml_str(toml).expect("nan is valid TOML");
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "supplies[0].slope"), "{errors:?}");
    }

    #[test]
    fn validation_rejects_non_finite_inputs() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.supplies[0].intercept = f64::INFINITY;
        cfg.demands[0].slope = f64::NAN;
        cfg.demands[0].cross[0].coefficient = f64::NAN;
        cfg.technologies[0].price_elasticity = f64::NAN;
        cfg.technologies[0].tech_change = Some(f64::INFINITY);
        cfg.technologies[1].base_output = f64::NAN;
        cfg.technologies[1].price_unit_conversion = f64::NEG_INFINITY;
        let fields: Vec<String> = cfg.validate().into_iter().map(|e| e.field).collect();
        for expected in [
            "supplies[0].intercept",
            "demands[0].slope",
            "demands[0].cross[0].coefficient",
            "technologies[0].price_elasticity",
            "technologies[0].tech_change",
            "technologies[1].base_output",
            "technologies[1].price_unit_conversion",
        ] {
            assert!(fields.iter().any(|f| f == expected), "missing {expected}: {fields:?}");
        }
    }

    #[test]
    fn validation_checks_vintage_quantities() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.technologies[0].vintages[0].calibration = Some(-1.0);
        cfg.technologies[0].vintages[0].fixed_output = Some(f64::NAN);
        let fields: Vec<String> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"technologies[0].vintages[0].calibration".to_string()));
        assert!(fields.contains(&"technologies[0].vintages[0].fixed_output".to_string()));
    }

    #[test]
    fn stress_uses_uneven_first_regime() {
        let stress = ScenarioConfig::stress();
        assert_eq!(stress.calendar.time_step1, 7);
        assert_eq!(stress.solver.strategy, StrategyKind::Bisection);
    }

    #[test]
    fn fixed_carbon_pins_carbon_price() {
        let cfg = ScenarioConfig::fixed_carbon();
        let carbon = cfg.markets.iter().find(|m| m.name == "carbon");
        assert_eq!(carbon.map(|m| m.solvable), Some(false));
    }
}
