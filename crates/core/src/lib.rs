pub mod config;
pub mod error;
pub mod ids;
pub mod money;

pub use config::Config;
pub use error::*;
pub use ids::*;
pub use money::*;
