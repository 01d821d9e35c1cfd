/// Model period calendar.
pub mod calendar;
pub mod dependency;
pub mod market;
pub mod marketplace;
/// Equilibrium solver loop.
pub mod solver;
pub mod step;
pub mod summary;
pub mod trace;
pub mod types;
