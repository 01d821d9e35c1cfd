//! Multi-period market equilibrium solver.
//!
//! A scenario is a set of markets, linear supply and demand curves, and
//! technologies that buy one input each. The [`runner`] solves the
//! scenario period by period on the [`sim::calendar`], recording every
//! solver iterate in a [`sim::trace`].

#[cfg(feature = "api")]
pub mod api;
pub mod cli;
pub mod config;
/// Supply and demand contributors.
pub mod contributors;
pub mod error;
pub mod io;
pub mod parallel;
pub mod runner;
/// Calendar, markets, solver and trace.
pub mod sim;
