pub mod config;
pub mod error;
mod lifecycle;
mod pairs;
pub mod reconciler;

pub use config::{ManualPair, ReconConfig};
pub use error::Error;
pub use reconciler::{Reconciler, RunReport, RunSummary};
