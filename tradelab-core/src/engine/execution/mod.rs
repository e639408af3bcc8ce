//! Execution: fill prices and per-fill costs.
//!
//! Stateless helpers: the cost model carries only configuration, path
//! resolution and fill pricing are pure functions of the bar and the levels.

pub mod cost_model;
pub mod fill_price;
pub mod path_policy;

pub use cost_model::{CostModel, FillCosts};
pub use fill_price::{stop_fill_price, target_fill_price};
pub use path_policy::{resolve_exit, ExitHit};
