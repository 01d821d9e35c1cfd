//! Technology input coefficient model.
//!
//! A [`TechnologyInput`] converts a technology's output into the physical
//! quantity it draws from one market, and pushes that quantity into the
//! marketplace. One instance exists per technology vintage; a vintage for a
//! later period is produced with [`TechnologyInput::clone_forward`].

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::sim::dependency::DependencyFinder;
use crate::sim::market::CalibratedDemand;
use crate::sim::marketplace::Marketplace;

/// Input-output coefficient as read in.
///
/// # Examples
///
/// ```
/// use market_equilibrium::contributors::Coefficient;
///
/// assert_eq!(Coefficient::Efficiency(0.5).coefficient(), 2.0);
/// assert_eq!(Coefficient::Intensity(0.5).coefficient(), 0.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Coefficient {
    /// Output per unit input.
    Efficiency(f64),
    /// Input per unit output.
    Intensity(f64),
}

impl Coefficient {
    /// Input required per unit of output.
    pub fn coefficient(&self) -> f64 {
        match *self {
            Self::Efficiency(e) => 1.0 / e,
            Self::Intensity(i) => i,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TechnologyInput {
    /// Name of the market the input is bought from.
    name: String,
    coefficient: Option<Coefficient>,
    income_elasticity: f64,
    /// Calibration value as read in.
    calibration_input: Option<f64>,
    /// Calibration value in effect, possibly rescaled.
    current_calibration: Option<f64>,
    tech_change: Option<f64>,
    price_unit_conversion: f64,
    co2_coefficient: Option<f64>,
    keywords: BTreeMap<String, String>,
    physical_demand: Vec<Option<f64>>,
    carbon_content: Vec<Option<f64>>,
    adjusted_coefficients: Vec<Option<f64>>,
}

impl TechnologyInput {
    pub fn new(name: impl Into<String>, period_count: usize) -> Self {
        Self {
            name: name.into(),
            coefficient: None,
            income_elasticity: 0.0,
            calibration_input: None,
            current_calibration: None,
            tech_change: None,
            price_unit_conversion: 1.0,
            co2_coefficient: None,
            keywords: BTreeMap::new(),
            physical_demand: vec![None; period_count],
            carbon_content: vec![None; period_count],
            adjusted_coefficients: vec![None; period_count],
        }
    }

    /// # Panics
    ///
    /// Panics if the value is not strictly positive.
    pub fn with_coefficient(mut self, coefficient: Coefficient) -> Self {
        let value = match coefficient {
            Coefficient::Efficiency(v) | Coefficient::Intensity(v) => v,
        };
        assert!(value > 0.0, "coefficient must be > 0, got {value}");
        self.coefficient = Some(coefficient);
        self
    }

    pub fn with_calibration(mut self, quantity: f64) -> Self {
        self.calibration_input = Some(quantity);
        self
    }

    pub fn with_tech_change(mut self, rate: f64) -> Self {
        self.tech_change = Some(rate);
        self
    }

    pub fn with_price_unit_conversion(mut self, factor: f64) -> Self {
        self.price_unit_conversion = factor;
        self
    }

    pub fn with_income_elasticity(mut self, elasticity: f64) -> Self {
        self.income_elasticity = elasticity;
        self
    }

    pub fn with_keyword(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.keywords.insert(key.into(), value.into());
        self
    }

    /// Vintage for a later period.
    ///
    /// The explicit coefficient is not carried over (it is filled in by
    /// [`copy_params_into`](Self::copy_params_into)), and neither is the
    /// calibration value, which only holds for the period it was read for.
    pub fn clone_forward(&self) -> Self {
        let period_count = self.adjusted_coefficients.len();
        Self {
            name: self.name.clone(),
            coefficient: None,
            income_elasticity: self.income_elasticity,
            calibration_input: None,
            current_calibration: None,
            tech_change: self.tech_change,
            price_unit_conversion: self.price_unit_conversion,
            co2_coefficient: None,
            keywords: self.keywords.clone(),
            physical_demand: vec![None; period_count],
            carbon_content: vec![None; period_count],
            adjusted_coefficients: vec![None; period_count],
        }
    }

    /// Registers the market dependency and seeds every period's coefficient.
    pub fn complete_init(&mut self, sector: &str, dependencies: &mut DependencyFinder) {
        dependencies.add_dependency(sector, &self.name);

        if let Some(calibration) = self.calibration_input {
            self.current_calibration = Some(calibration);
        }

        let coefficient = self.coefficient.map_or(1.0, |c| c.coefficient());
        self.adjusted_coefficients.fill(Some(coefficient));
    }

    /// Per-period setup before the period is solved.
    pub fn init_calc(&mut self, region: &str, period: usize, marketplace: &Marketplace) {
        self.co2_coefficient = Some(marketplace.co2_coefficient(&self.name, region, period));

        if let Some(coefficient) = self.coefficient {
            self.adjusted_coefficients[period] = Some(coefficient.coefficient());
        } else if self.adjusted_coefficients[period].is_none() {
            self.adjusted_coefficients[period] = Some(1.0);
        }
    }

    /// Hands this vintage's coefficient for `period - 1` to `other` unless
    /// `other` read in its own.
    ///
    /// # Panics
    ///
    /// Panics if `period` is 0.
    pub fn copy_params_into(&self, other: &mut TechnologyInput, period: usize) {
        assert!(period > 0, "copy_params_into called for the base period");
        if other.coefficient.is_none() {
            other.adjusted_coefficients[period] = self.adjusted_coefficients[period - 1];
        }
    }

    /// Improves an inherited coefficient by the technical-change rate over
    /// `years`. Explicit coefficients are left alone.
    pub fn apply_technical_change(&mut self, period: usize, years: i32) {
        if self.coefficient.is_some() {
            return;
        }
        if let (Some(rate), Some(current)) = (self.tech_change, self.adjusted_coefficients[period])
        {
            self.adjusted_coefficients[period] = Some(current / (1.0 + rate).powi(years));
        }
    }

    /// Records physical demand and forwards it to the input's market.
    ///
    /// Carbon content needs the emissions coefficient read by
    /// [`init_calc`](Self::init_calc); before that it stays unset rather
    /// than zero.
    pub fn set_physical_demand(
        &mut self,
        quantity: f64,
        region: &str,
        period: usize,
        marketplace: &mut Marketplace,
    ) {
        self.physical_demand[period] = Some(quantity);
        marketplace.add_to_demand(&self.name, region, quantity, period, true);
        self.carbon_content[period] = self.co2_coefficient.map(|c| quantity * c);
    }

    /// Pins the market's calibrated demand for `period`, or marks it variable.
    ///
    /// A calibrated output wins over a calibrated input. Markets without
    /// market info are skipped.
    pub fn tabulate_fixed_quantity(
        &self,
        region: &str,
        fixed_output: Option<f64>,
        is_investment_period: bool,
        period: usize,
        marketplace: &mut Marketplace,
    ) {
        let coefficient = self.coefficient(period).unwrap_or(1.0);
        let Some(info) = marketplace.market_info_mut(&self.name, region, period) else {
            return;
        };
        let existing = info.calibrated_demand.existing_fixed();

        info.calibrated_demand = match (fixed_output, self.current_calibration) {
            (Some(output), calibration) => {
                debug_assert!(
                    !is_investment_period
                        || calibration.is_none_or(|c| (output * coefficient - c).abs() < 1e-6),
                    "calibrated input disagrees with calibrated output"
                );
                CalibratedDemand::Fixed(output * coefficient + existing)
            }
            (None, Some(calibration)) if is_investment_period => {
                CalibratedDemand::Fixed(calibration + existing)
            }
            _ => CalibratedDemand::Variable,
        };
    }

    /// Rescales the calibration value, if one was read in.
    ///
    /// # Panics
    ///
    /// Panics if `factor` is negative.
    pub fn scale_calibration_quantity(&mut self, factor: f64) {
        assert!(factor >= 0.0, "calibration scale factor must be >= 0, got {factor}");
        if let Some(calibration) = self.current_calibration.as_mut() {
            *calibration *= factor;
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_explicit_coefficient(&self) -> bool {
        self.coefficient.is_some()
    }

    pub fn coefficient(&self, period: usize) -> Option<f64> {
        self.adjusted_coefficients.get(period).copied().flatten()
    }

    /// # Panics
    ///
    /// Panics if `coefficient` is negative.
    pub fn set_coefficient(&mut self, coefficient: f64, period: usize) {
        assert!(coefficient >= 0.0);
        self.adjusted_coefficients[period] = Some(coefficient);
    }

    /// Market price in the technology's price units.
    pub fn price(&self, region: &str, period: usize, marketplace: &Marketplace) -> f64 {
        self.price_unit_conversion * marketplace.get_price(&self.name, region, period).unwrap_or(0.0)
    }

    pub fn price_unit_conversion(&self) -> f64 {
        self.price_unit_conversion
    }

    pub fn calibration_quantity(&self) -> Option<f64> {
        self.current_calibration
    }

    pub fn physical_demand(&self, period: usize) -> Option<f64> {
        self.physical_demand.get(period).copied().flatten()
    }

    pub fn carbon_content(&self, period: usize) -> Option<f64> {
        self.carbon_content.get(period).copied().flatten()
    }

    pub fn co2_coefficient(&self) -> Option<f64> {
        self.co2_coefficient
    }

    pub fn income_elasticity(&self) -> f64 {
        self.income_elasticity
    }

    /// Leontief input: demand does not respond to its own price.
    pub fn price_elasticity(&self) -> f64 {
        0.0
    }

    pub fn tech_change(&self) -> Option<f64> {
        self.tech_change
    }

    pub fn keyword(&self, key: &str) -> Option<&str> {
        self.keywords.get(key).map(String::as_str)
    }
}
