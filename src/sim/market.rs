/// Calibrated-demand counter kept per market per period.
///
/// Technologies tabulate into this counter before a period is solved. A
/// single price-responsive contributor turns the whole market `Variable`.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize)]
pub enum CalibratedDemand {
    /// Nothing tabulated yet.
    #[default]
    Unset,
    /// Demand pinned to this physical quantity.
    Fixed(f64),
    /// At least one contributor responds to price.
    Variable,
}

impl CalibratedDemand {
    /// The fixed quantity so far, treating `Unset` and `Variable` as zero.
    pub fn existing_fixed(&self) -> f64 {
        match self {
            Self::Fixed(q) => q.max(0.0),
            Self::Unset | Self::Variable => 0.0,
        }
    }
}

/// Per-period bookkeeping attached to a market.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketInfo {
    pub calibrated_demand: CalibratedDemand,
    /// CO2 emitted per unit of the good consumed.
    pub co2_coefficient: Option<f64>,
}

/// State of one market in one period.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketPeriod {
    pub price: f64,
    demand: f64,
    supply: f64,
    /// `false` when the price is pinned externally.
    pub solvable: bool,
    pub info: MarketInfo,
}

/// A named, priced, clearable good in one region.
///
/// Demand and supply are accumulators: the solver resets them at the start
/// of every iteration and contributors add to them.
///
/// Excess-demand convention: `demand - supply`, positive when the price is
/// too low.
#[derive(Debug, Clone)]
pub struct Market {
    name: String,
    region: String,
    periods: Vec<MarketPeriod>,
}

impl Market {
    /// Creates a market priced at `initial_price` in every period.
    ///
    /// # Panics
    ///
    /// Panics if `initial_price` is negative or not finite.
    pub fn new(
        name: impl Into<String>,
        region: impl Into<String>,
        period_count: usize,
        initial_price: f64,
        solvable: bool,
    ) -> Self {
        assert!(initial_price.is_finite() && initial_price >= 0.0);
        Self {
            name: name.into(),
            region: region.into(),
            periods: vec![
                MarketPeriod {
                    price: initial_price,
                    demand: 0.0,
                    supply: 0.0,
                    solvable,
                    info: MarketInfo::default(),
                };
                period_count
            ],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Human-readable key used in reports, `region:name`.
    pub fn label(&self) -> String {
        format!("{}:{}", self.region, self.name)
    }

    pub fn period(&self, period: usize) -> &MarketPeriod {
        &self.periods[period]
    }

    pub fn period_mut(&mut self, period: usize) -> &mut MarketPeriod {
        &mut self.periods[period]
    }

    pub fn period_count(&self) -> usize {
        self.periods.len()
    }

    /// Clears demand and supply for `period`.
    pub fn reset(&mut self, period: usize) {
        let p = &mut self.periods[period];
        p.demand = 0.0;
        p.supply = 0.0;
    }

    pub fn add_demand(&mut self, period: usize, quantity: f64) {
        self.periods[period].demand += quantity;
    }

    pub fn add_supply(&mut self, period: usize, quantity: f64) {
        self.periods[period].supply += quantity;
    }

    pub fn price(&self, period: usize) -> f64 {
        self.periods[period].price
    }

    pub fn demand(&self, period: usize) -> f64 {
        self.periods[period].demand
    }

    pub fn supply(&self, period: usize) -> f64 {
        self.periods[period].supply
    }

    pub fn is_solvable(&self, period: usize) -> bool {
        self.periods[period].solvable
    }

    /// Excess demand for `period`, forced to zero when both sides are below
    /// `trivial_threshold`.
    pub fn excess_demand(&self, period: usize, trivial_threshold: f64) -> f64 {
        excess_demand(self.demand(period), self.supply(period), trivial_threshold)
    }
}

/// `demand - supply`, or exactly zero for a market with (near) nothing on
/// either side.
pub fn excess_demand(demand: f64, supply: f64, trivial_threshold: f64) -> f64 {
    if demand.abs() <= trivial_threshold && supply.abs() <= trivial_threshold {
        0.0
    } else {
        demand - supply
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_market_defaults() {
        let market = Market::new("gas", "USA", 3, 2.5, true);
        assert_eq!(market.name(), "gas");
        assert_eq!(market.label(), "USA:gas");
        assert_eq!(market.period_count(), 3);
        assert_eq!(market.price(2), 2.5);
        assert_eq!(market.demand(0), 0.0);
        assert!(market.is_solvable(1));
        assert_eq!(
            market.period(0).info.calibrated_demand,
            CalibratedDemand::Unset
        );
    }

    #[test]
    fn test_accumulate_and_reset() {
        let mut market = Market::new("oil", "USA", 2, 1.0, true);
        market.add_demand(1, 3.5);
        market.add_demand(1, 0.5);
        market.add_supply(1, 1.0);
        assert!((market.excess_demand(1, 1e-12) - 3.0).abs() < 1e-12);
        // other periods untouched
        assert_eq!(market.demand(0), 0.0);

        market.reset(1);
        assert_eq!(market.demand(1), 0.0);
        assert_eq!(market.supply(1), 0.0);
    }

    #[test]
    fn trivial_market_has_zero_excess_demand() {
        assert_eq!(excess_demand(1e-14, 0.0, 1e-12), 0.0);
        assert_eq!(excess_demand(0.0, 0.0, 0.0), 0.0);
        assert_eq!(excess_demand(2.0, 0.5, 1e-12), 1.5);
    }

    #[test]
    fn existing_fixed_ignores_variable_marker() {
        assert_eq!(CalibratedDemand::Unset.existing_fixed(), 0.0);
        assert_eq!(CalibratedDemand::Variable.existing_fixed(), 0.0);
        assert_eq!(CalibratedDemand::Fixed(4.0).existing_fixed(), 4.0);
    }

    #[test]
    #[should_panic]
    fn negative_initial_price_panics() {
        Market::new("oil", "USA", 1, -1.0, true);
    }
}
