use crate::sim::marketplace::MarketId;

use super::types::{Contributor, PriceContext, Side};

/// Upward-sloping linear supply curve, `S(p) = max(0, intercept + slope * p)`.
///
/// # Examples
///
/// ```
/// use market_equilibrium::contributors::{Contributor, LinearSupply, PriceContext};
/// use market_equilibrium::sim::marketplace::MarketId;
///
/// let supply = LinearSupply::new(MarketId(0), 0.0, 2.0);
/// let prices = [3.0];
/// assert_eq!(supply.quantity(&PriceContext::new(0, &prices)), 6.0);
/// ```
#[derive(Debug, Clone)]
pub struct LinearSupply {
    /// Market supplied into
    pub market: MarketId,

    /// Quantity supplied at a zero price
    pub intercept: f64,

    /// Additional quantity per unit price
    pub slope: f64,
}

impl LinearSupply {
    /// # Panics
    ///
    /// Panics if `slope` is negative.
    pub fn new(market: MarketId, intercept: f64, slope: f64) -> Self {
        assert!(slope >= 0.0, "supply slope must be >= 0, got {slope}");
        Self {
            market,
            intercept,
            slope,
        }
    }
}

impl Contributor for LinearSupply {
    fn market(&self) -> Option<MarketId> {
        Some(self.market)
    }

    fn side(&self) -> Side {
        Side::Supply
    }

    fn quantity(&self, context: &PriceContext) -> f64 {
        (self.intercept + self.slope * context.price(self.market)).max(0.0)
    }

    fn contributor_type(&self) -> &'static str {
        "linear_supply"
    }
}

/// Downward-sloping linear demand curve with optional cross-price terms,
/// `D(p) = max(0, intercept - slope * p + sum(cross_j * p_j))`.
#[derive(Debug, Clone)]
pub struct LinearDemand {
    /// Market demanded from
    pub market: MarketId,

    /// Quantity demanded at a zero price
    pub intercept: f64,

    /// Quantity lost per unit of own price
    pub slope: f64,

    /// Quantity gained per unit of another market's price
    pub cross: Vec<(MarketId, f64)>,
}

impl LinearDemand {
    /// # Panics
    ///
    /// Panics if `slope` is negative.
    pub fn new(market: MarketId, intercept: f64, slope: f64) -> Self {
        assert!(slope >= 0.0, "demand slope must be >= 0, got {slope}");
        Self {
            market,
            intercept,
            slope,
            cross: Vec::new(),
        }
    }

    pub fn with_cross_price(mut self, market: MarketId, coefficient: f64) -> Self {
        self.cross.push((market, coefficient));
        self
    }
}

impl Contributor for LinearDemand {
    fn market(&self) -> Option<MarketId> {
        Some(self.market)
    }

    fn side(&self) -> Side {
        Side::Demand
    }

    fn quantity(&self, context: &PriceContext) -> f64 {
        let cross: f64 = self
            .cross
            .iter()
            .map(|&(id, c)| c * context.price(id))
            .sum();
        (self.intercept - self.slope * context.price(self.market) + cross).max(0.0)
    }

    fn contributor_type(&self) -> &'static str {
        "linear_demand"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::marketplace::Marketplace;

    #[test]
    fn supply_is_clipped_at_zero() {
        let supply = LinearSupply::new(MarketId(0), -4.0, 1.0);
        let prices = [1.0];
        assert_eq!(supply.quantity(&PriceContext::new(0, &prices)), 0.0);
    }

    #[test]
    fn demand_includes_cross_price_terms() {
        let demand = LinearDemand::new(MarketId(0), 10.0, 2.0).with_cross_price(MarketId(1), 0.5);
        let prices = [2.0, 4.0];
        assert_eq!(demand.quantity(&PriceContext::new(0, &prices)), 8.0);
    }

    #[test]
    fn demand_is_clipped_at_zero() {
        let demand = LinearDemand::new(MarketId(0), 1.0, 2.0);
        let prices = [5.0];
        assert_eq!(demand.quantity(&PriceContext::new(0, &prices)), 0.0);
    }

    #[test]
    fn record_adds_to_matching_side() {
        let mut mp = Marketplace::new(1);
        let id = mp.add_market("wheat", "World", 1.0, true);
        let mut supply = LinearSupply::new(id, 0.0, 1.0);
        let mut demand = LinearDemand::new(id, 5.0, 1.0);
        supply.record(2.0, 0, &mut mp);
        demand.record(3.0, 0, &mut mp);
        assert_eq!(mp.market(id).supply(0), 2.0);
        assert_eq!(mp.market(id).demand(0), 3.0);
    }

    #[test]
    #[should_panic]
    fn negative_slope_panics() {
        LinearSupply::new(MarketId(0), 0.0, -1.0);
    }
}
