//! Common types and traits for market contributors.

use crate::sim::marketplace::{MarketId, Marketplace};

/// Which side of its market a contributor adds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Demand,
    Supply,
}

/// Contextual information passed to contributors when they are evaluated.
///
/// # Fields
/// * `period` - Model period being solved
/// * `prices` - Trial price of every market, indexed by [`MarketId`]
#[derive(Debug, Clone, Copy)]
pub struct PriceContext<'a> {
    pub period: usize,
    pub prices: &'a [f64],
}

impl<'a> PriceContext<'a> {
    pub fn new(period: usize, prices: &'a [f64]) -> Self {
        Self { period, prices }
    }

    /// Trial price of `market`.
    ///
    /// # Panics
    ///
    /// Panics if `market` is not covered by the price vector.
    pub fn price(&self, market: MarketId) -> f64 {
        self.prices[market.0]
    }
}

/// Anything that puts a price-dependent quantity into one market.
///
/// Evaluation is split from recording so that the solver can evaluate every
/// contributor against the same trial prices, possibly in parallel, before
/// any market accumulator is touched.
pub trait Contributor: Send + Sync {
    /// Market the quantity goes to, or `None` if it could not be resolved.
    fn market(&self) -> Option<MarketId>;

    fn side(&self) -> Side;

    /// Quantity at the trial prices in `context`. Must not have side effects.
    fn quantity(&self, context: &PriceContext) -> f64;

    /// Adds an evaluated quantity to the marketplace for `period`.
    fn record(&mut self, quantity: f64, period: usize, marketplace: &mut Marketplace) {
        let Some(id) = self.market() else {
            return;
        };
        let market = marketplace.market_mut(id);
        match self.side() {
            Side::Demand => market.add_demand(period, quantity),
            Side::Supply => market.add_supply(period, quantity),
        }
    }

    /// Returns a human-readable type name for the contributor.
    fn contributor_type(&self) -> &'static str;
}
