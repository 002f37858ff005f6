pub mod bounded;
pub mod pi_filter;

pub use bounded::{BoundedController, ControllerState, FilterLimits};
pub use pi_filter::{FilterCoefficients, FilterStatus, PiFilter};
