//! Market registry: owns every market and resolves them by name and region.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::market::{Market, MarketInfo};

/// Stable integer identifier of a market, assigned in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketId(pub usize);

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// All markets of a scenario, indexed by [`MarketId`].
///
/// Passed explicitly to the solver and to technologies; there is no global
/// marketplace.
#[derive(Debug, Clone)]
pub struct Marketplace {
    period_count: usize,
    markets: Vec<Market>,
    index: HashMap<(String, String), MarketId>,
}

impl Marketplace {
    /// Creates an empty marketplace whose markets span `period_count` periods.
    pub fn new(period_count: usize) -> Self {
        Self {
            period_count,
            markets: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Registers a market, returning the existing id if `(name, region)` is
    /// already known.
    pub fn add_market(
        &mut self,
        name: &str,
        region: &str,
        initial_price: f64,
        solvable: bool,
    ) -> MarketId {
        let key = (name.to_string(), region.to_string());
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        let id = MarketId(self.markets.len());
        self.markets.push(Market::new(
            name,
            region,
            self.period_count,
            initial_price,
            solvable,
        ));
        self.index.insert(key, id);
        id
    }

    pub fn market_id(&self, name: &str, region: &str) -> Option<MarketId> {
        self.index
            .get(&(name.to_string(), region.to_string()))
            .copied()
    }

    pub fn market(&self, id: MarketId) -> &Market {
        &self.markets[id.0]
    }

    pub fn market_mut(&mut self, id: MarketId) -> &mut Market {
        &mut self.markets[id.0]
    }

    /// Markets in id order.
    pub fn markets(&self) -> impl Iterator<Item = (MarketId, &Market)> {
        self.markets.iter().enumerate().map(|(i, m)| (MarketId(i), m))
    }

    pub fn len(&self) -> usize {
        self.markets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }

    pub fn period_count(&self) -> usize {
        self.period_count
    }

    /// Ids of the markets whose price is solved for in `period`.
    pub fn free_markets(&self, period: usize) -> Vec<MarketId> {
        self.markets()
            .filter(|(_, m)| m.is_solvable(period))
            .map(|(id, _)| id)
            .collect()
    }

    /// Prices of every market in `period`, indexed by id.
    pub fn prices(&self, period: usize) -> Vec<f64> {
        self.markets.iter().map(|m| m.price(period)).collect()
    }

    /// Overwrites every market's price in `period`.
    ///
    /// # Panics
    ///
    /// Panics if `prices` does not have one entry per market.
    pub fn set_prices(&mut self, period: usize, prices: &[f64]) {
        assert_eq!(prices.len(), self.markets.len());
        for (market, &price) in self.markets.iter_mut().zip(prices) {
            market.period_mut(period).price = price;
        }
    }

    pub fn set_price(&mut self, id: MarketId, period: usize, price: f64) {
        self.markets[id.0].period_mut(period).price = price;
    }

    pub fn set_solvable(&mut self, id: MarketId, period: usize, solvable: bool) {
        self.markets[id.0].period_mut(period).solvable = solvable;
    }

    /// Clears demand and supply of every market in `period`.
    pub fn reset(&mut self, period: usize) {
        for market in &mut self.markets {
            market.reset(period);
        }
    }

    /// Price of the named market, or `None` if it is not registered.
    pub fn get_price(&self, name: &str, region: &str, period: usize) -> Option<f64> {
        self.market_id(name, region)
            .map(|id| self.markets[id.0].price(period))
    }

    /// Adds `quantity` to the named market's demand.
    ///
    /// Returns `false` if the market does not exist; a warning is logged only
    /// when `must_exist` is set.
    pub fn add_to_demand(
        &mut self,
        name: &str,
        region: &str,
        quantity: f64,
        period: usize,
        must_exist: bool,
    ) -> bool {
        match self.market_id(name, region) {
            Some(id) => {
                self.markets[id.0].add_demand(period, quantity);
                true
            }
            None => {
                if must_exist {
                    warn!(market = name, region, "demand added to a missing market");
                }
                false
            }
        }
    }

    /// Adds `quantity` to the named market's supply. See [`add_to_demand`](Self::add_to_demand).
    pub fn add_to_supply(
        &mut self,
        name: &str,
        region: &str,
        quantity: f64,
        period: usize,
        must_exist: bool,
    ) -> bool {
        match self.market_id(name, region) {
            Some(id) => {
                self.markets[id.0].add_supply(period, quantity);
                true
            }
            None => {
                if must_exist {
                    warn!(market = name, region, "supply added to a missing market");
                }
                false
            }
        }
    }

    pub fn market_info(&self, name: &str, region: &str, period: usize) -> Option<&MarketInfo> {
        self.market_id(name, region)
            .map(|id| &self.markets[id.0].period(period).info)
    }

    pub fn market_info_mut(
        &mut self,
        name: &str,
        region: &str,
        period: usize,
    ) -> Option<&mut MarketInfo> {
        let id = self.market_id(name, region)?;
        Some(&mut self.markets[id.0].period_mut(period).info)
    }

    /// CO2 coefficient of the named good, 0 when unknown.
    pub fn co2_coefficient(&self, name: &str, region: &str, period: usize) -> f64 {
        self.market_info(name, region, period)
            .and_then(|info| info.co2_coefficient)
            .unwrap_or(0.0)
    }

    /// Sets the CO2 coefficient of a market for every period.
    pub fn set_co2_coefficient(&mut self, id: MarketId, coefficient: f64) {
        let market = &mut self.markets[id.0];
        for period in 0..market.period_count() {
            market.period_mut(period).info.co2_coefficient = Some(coefficient);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::market::CalibratedDemand;

    fn two_markets() -> Marketplace {
        let mut mp = Marketplace::new(3);
        mp.add_market("oil", "USA", 4.0, true);
        mp.add_market("carbon", "USA", 0.0, false);
        mp
    }

    #[test]
    fn ids_are_assigned_in_order_and_deduplicated() {
        let mut mp = two_markets();
        assert_eq!(mp.market_id("oil", "USA"), Some(MarketId(0)));
        assert_eq!(mp.market_id("carbon", "USA"), Some(MarketId(1)));
        assert_eq!(mp.add_market("oil", "USA", 9.0, true), MarketId(0));
        assert_eq!(mp.len(), 2);
        assert_eq!(mp.market_id("oil", "EU"), None);
    }

    #[test]
    fn free_markets_excludes_fixed() {
        let mp = two_markets();
        assert_eq!(mp.free_markets(0), vec![MarketId(0)]);
    }

    #[test]
    fn demand_routed_by_name() {
        let mut mp = two_markets();
        assert!(mp.add_to_demand("oil", "USA", 2.0, 1, true));
        assert!(mp.add_to_supply("oil", "USA", 0.5, 1, true));
        assert!(!mp.add_to_demand("coal", "USA", 2.0, 1, false));
        let oil = mp.market(MarketId(0));
        assert_eq!(oil.demand(1), 2.0);
        assert_eq!(oil.supply(1), 0.5);

        mp.reset(1);
        assert_eq!(mp.market(MarketId(0)).demand(1), 0.0);
    }

    #[test]
    fn prices_round_trip() {
        let mut mp = two_markets();
        mp.set_prices(2, &[5.0, 1.0]);
        assert_eq!(mp.prices(2), vec![5.0, 1.0]);
        assert_eq!(mp.get_price("oil", "USA", 2), Some(5.0));
        assert_eq!(mp.get_price("oil", "USA", 0), Some(4.0));
        assert_eq!(mp.get_price("coal", "USA", 0), None);
    }

    #[test]
    fn co2_coefficient_defaults_to_zero() {
        let mut mp = two_markets();
        assert_eq!(mp.co2_coefficient("oil", "USA", 0), 0.0);
        mp.set_co2_coefficient(MarketId(0), 0.02);
        assert_eq!(mp.co2_coefficient("oil", "USA", 2), 0.02);
        assert_eq!(mp.co2_coefficient("coal", "USA", 0), 0.0);
    }

    #[test]
    fn market_info_is_per_period() {
        let mut mp = two_markets();
        if let Some(info) = mp.market_info_mut("oil", "USA", 1) {
            info.calibrated_demand = CalibratedDemand::Fixed(3.0);
        }
        assert_eq!(
            mp.market_info("oil", "USA", 1).map(|i| i.calibrated_demand),
            Some(CalibratedDemand::Fixed(3.0))
        );
        assert_eq!(
            mp.market_info("oil", "USA", 0).map(|i| i.calibrated_demand),
            Some(CalibratedDemand::Unset)
        );
    }
}
