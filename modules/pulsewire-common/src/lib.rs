pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::Config;
pub use error::PulsewireError;
pub use traits::*;
pub use types::*;
