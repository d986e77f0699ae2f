pub mod data_source;
pub mod error;
pub mod factors;
pub mod multipliers;
pub mod referee_profile;
pub mod risk_scorer;

pub use data_source::*;
pub use error::*;
pub use referee_profile::*;
pub use risk_scorer::*;
