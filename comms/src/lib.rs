mod deserialize;
pub mod frame;
mod receiver;
mod serialize;

pub use deserialize::{Deserialize, Reader};
pub use frame::{ArtifactFrame, LayerRecord, TensorRecord};
pub use receiver::recv_artifact;
pub use serialize::Serialize;

type WireInt = u32;
const WIRE_INT_SIZE: usize = size_of::<WireInt>();

/// The artifact layout version this crate reads and writes.
pub const FORMAT_VERSION: u32 = 1;
