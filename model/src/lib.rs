pub mod arch;
pub mod compiler;
pub mod error;
pub mod initialization;
pub mod ops;

pub use error::{MlErr, Result};
