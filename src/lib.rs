mod config;
mod error;
mod figure;
mod metrics;
mod pipeline;
mod report;
mod result;
mod simulation;
mod summary;
mod sweep;
mod utils;

pub use config::*;
pub use error::*;
pub use figure::*;
pub use metrics::*;
pub use pipeline::*;
pub use report::*;
pub use result::*;
pub use simulation::*;
pub use summary::*;
pub use sweep::*;
pub use utils::*;
