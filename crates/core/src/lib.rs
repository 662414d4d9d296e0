pub mod categories;
pub mod config;
pub mod error;
pub mod time_range;

pub use categories::{CategoryConfig, CategorySet};
pub use config::Config;
pub use error::*;
pub use time_range::{BaselineWindow, InspectionWindow, ResolvedRange, TimeRangeExpr, TimeUnit};
