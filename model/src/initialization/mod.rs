mod chained;
mod constant;
mod error;
mod init_spec;
mod param_gen;
mod random;

pub use chained::ChainedParamGen;
pub use constant::ConstParamGen;
pub use error::RandErr;
pub use init_spec::InitSpec;
pub use param_gen::ParamGen;
pub use random::RandParamGen;

/// The specific result type for the parameter generators.
pub type Result<T> = std::result::Result<T, RandErr>;
