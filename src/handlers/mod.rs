pub mod adr;
pub mod config;
pub mod transcript;

pub use adr::*;
pub use config::*;
pub use transcript::*;
