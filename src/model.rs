//! Numeric model of the common-pool resource.
//!
//! Pure functions and small value types, no I/O and no clocks:
//! - Resource stock and its growth rules
//! - Aggregation of extraction choices into a group total
//! - Instantaneous and discounted payoffs
//! - Infinite-horizon continuation value

mod aggregator;
mod horizon;
mod payoff;
mod stock;

/// Player identifier assigned by the host.
pub type PlayerId = u32;

/// Group identifier, unique within a sequence.
pub type GroupId = u32;

pub use aggregator::{ExtractionAggregator, Submission, TickSnapshot};
pub use horizon::{HorizonCase, HorizonInputs, Projection, fitted_continuation, project};
pub use payoff::{Discounting, PayoffBreakdown, PayoffModel, PayoffParams};
pub use stock::{ResourceStock, drift};
