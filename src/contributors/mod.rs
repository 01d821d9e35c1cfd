//! Supply and demand contributors evaluated by the solver.

/// Technology input coefficient model.
pub mod input;
/// Linear supply and demand curves.
pub mod linear;
/// Technology vintages buying one input.
pub mod technology;
pub mod types;

pub use input::{Coefficient, TechnologyInput};
pub use linear::{LinearDemand, LinearSupply};
pub use technology::TechnologyDemand;
pub use types::{Contributor, PriceContext, Side};
