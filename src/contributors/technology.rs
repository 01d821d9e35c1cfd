//! Technology vintage that buys one input from the marketplace.

use crate::sim::dependency::DependencyFinder;
use crate::sim::marketplace::{MarketId, Marketplace};

use super::input::TechnologyInput;
use super::types::{Contributor, PriceContext, Side};

/// A technology vintage producing a sector's output from one input.
///
/// Output responds to the input price with a constant elasticity around a
/// reference price. The input demand is output times the input's coefficient
/// for the period, unless the output or the input is calibrated, in which
/// case the demand is pinned.
#[derive(Debug, Clone)]
pub struct TechnologyDemand {
    /// Technology name
    pub name: String,

    /// Sector the technology produces for
    pub sector: String,

    /// Region the input is bought in
    pub region: String,

    /// Output at the reference price
    pub base_output: f64,

    /// Own-price elasticity of output (positive means demand falls with price)
    pub price_elasticity: f64,

    /// Input price at which output equals `base_output`
    pub reference_price: f64,

    /// Calibrated output, if read in
    pub fixed_output: Option<f64>,

    input: TechnologyInput,
    market: Option<MarketId>,
}

impl TechnologyDemand {
    pub fn new(
        name: impl Into<String>,
        sector: impl Into<String>,
        region: impl Into<String>,
        input: TechnologyInput,
        base_output: f64,
    ) -> Self {
        Self {
            name: name.into(),
            sector: sector.into(),
            region: region.into(),
            base_output,
            price_elasticity: 0.0,
            reference_price: 1.0,
            fixed_output: None,
            input,
            market: None,
        }
    }

    /// # Panics
    ///
    /// Panics if `reference_price` is not strictly positive.
    pub fn with_price_response(mut self, elasticity: f64, reference_price: f64) -> Self {
        assert!(reference_price > 0.0, "reference price must be > 0");
        self.price_elasticity = elasticity;
        self.reference_price = reference_price;
        self
    }

    pub fn with_fixed_output(mut self, output: f64) -> Self {
        self.fixed_output = Some(output);
        self
    }

    /// Next vintage of this technology, with the input cloned forward and no
    /// calibrated output.
    pub fn clone_forward(&self) -> Self {
        Self {
            fixed_output: None,
            input: self.input.clone_forward(),
            ..self.clone()
        }
    }

    /// Resolves the input market and seeds the input's coefficients.
    pub fn complete_init(&mut self, marketplace: &Marketplace, dependencies: &mut DependencyFinder) {
        self.input.complete_init(&self.sector, dependencies);
        self.market = marketplace.market_id(self.input.name(), &self.region);
    }

    pub fn init_calc(&mut self, period: usize, marketplace: &Marketplace) {
        self.input.init_calc(&self.region, period, marketplace);
    }

    pub fn tabulate_fixed_quantity(
        &self,
        period: usize,
        is_investment_period: bool,
        marketplace: &mut Marketplace,
    ) {
        self.input.tabulate_fixed_quantity(
            &self.region,
            self.fixed_output,
            is_investment_period,
            period,
            marketplace,
        );
    }

    /// Output at an input price already converted to technology units.
    pub fn output(&self, input_price: f64) -> f64 {
        if input_price <= 0.0 || self.price_elasticity == 0.0 {
            return self.base_output;
        }
        self.base_output * (input_price / self.reference_price).powf(-self.price_elasticity)
    }

    pub fn input(&self) -> &TechnologyInput {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut TechnologyInput {
        &mut self.input
    }
}

impl Contributor for TechnologyDemand {
    fn market(&self) -> Option<MarketId> {
        self.market
    }

    fn side(&self) -> Side {
        Side::Demand
    }

    fn quantity(&self, context: &PriceContext) -> f64 {
        let coefficient = self.input.coefficient(context.period).unwrap_or(1.0);
        if let Some(output) = self.fixed_output {
            return output * coefficient;
        }
        if let Some(calibration) = self.input.calibration_quantity() {
            return calibration;
        }
        let Some(market) = self.market else {
            return 0.0;
        };
        let price = self.input.price_unit_conversion() * context.price(market);
        self.output(price) * coefficient
    }

    fn record(&mut self, quantity: f64, period: usize, marketplace: &mut Marketplace) {
        if self.market.is_none() {
            return;
        }
        self.input
            .set_physical_demand(quantity, &self.region, period, marketplace);
    }

    fn contributor_type(&self) -> &'static str {
        "technology"
    }
}
