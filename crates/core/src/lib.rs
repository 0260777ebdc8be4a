pub mod codes;
pub mod config;
pub mod decision;
pub mod error;
pub mod transaction;

pub use config::Config;
pub use decision::*;
pub use error::*;
pub use transaction::*;
