//! The artifact buffer layout, version 1.
//!
//! Every integer is a little endian `u32`, every float a little endian `f32`:
//!
//! ```text
//! version | total_len | layer_count | tensor_count | layer record * | tensor record *
//!
//! layer record:  name | kind | act_fn | attrs | input shape | output shape | param indices
//! tensor record: name | shape | byte_len | payload
//! ```
//!
//! Strings are length prefixed, shapes and other integer sequences are count prefixed.

use std::{borrow::Cow, io};

use crate::{
    Deserialize, FORMAT_VERSION, Reader, Serialize, WIRE_INT_SIZE,
    serialize::{put_f32s, put_int, put_ints, put_str, to_wire},
};

const HEADER_SIZE: usize = 4 * WIRE_INT_SIZE;
const TOTAL_LEN_OFFSET: usize = WIRE_INT_SIZE;

/// One computation step as it travels on the wire.
///
/// The tags and attributes are opaque here, their meaning belongs to the graph crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerRecord<'a> {
    pub name: Cow<'a, str>,
    pub kind: u32,
    pub act_fn: u32,
    pub attrs: Vec<usize>,
    pub input: Vec<usize>,
    pub output: Vec<usize>,
    pub params: Vec<usize>,
}

/// A named parameter tensor as it travels on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorRecord<'a> {
    pub name: Cow<'a, str>,
    pub shape: Vec<usize>,
    pub data: Cow<'a, [f32]>,
}

/// The whole artifact buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactFrame<'a> {
    pub version: u32,
    pub layers: Vec<LayerRecord<'a>>,
    pub tensors: Vec<TensorRecord<'a>>,
}

impl ArtifactFrame<'_> {
    /// Reads the `total_len` header field of an encoded buffer without decoding the rest.
    ///
    /// # Arguments
    /// * `buf` - At least the first bytes of an encoded artifact.
    ///
    /// # Returns
    /// The byte length the buffer declares for itself.
    pub fn declared_len(buf: &[u8]) -> io::Result<usize> {
        let mut reader = Reader::new(buf);
        reader.bytes(TOTAL_LEN_OFFSET)?;
        reader.int()
    }

    fn invalid<T>(msg: String) -> io::Result<T> {
        Err(io::Error::new(io::ErrorKind::InvalidData, msg))
    }
}

impl Serialize for LayerRecord<'_> {
    fn serialize(&self, buf: &mut Vec<u8>) -> io::Result<()> {
        put_str(buf, &self.name)?;
        buf.extend_from_slice(&self.kind.to_le_bytes());
        buf.extend_from_slice(&self.act_fn.to_le_bytes());
        put_ints(buf, &self.attrs, "layer attribute")?;
        put_ints(buf, &self.input, "input dimension")?;
        put_ints(buf, &self.output, "output dimension")?;
        put_ints(buf, &self.params, "parameter index")
    }
}

impl Serialize for TensorRecord<'_> {
    fn serialize(&self, buf: &mut Vec<u8>) -> io::Result<()> {
        let numel = self
            .shape
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d));
        if numel != Some(self.data.len()) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "tensor {} has shape {:?} but {} values",
                    self.name,
                    self.shape,
                    self.data.len()
                ),
            ));
        }

        put_str(buf, &self.name)?;
        put_ints(buf, &self.shape, "tensor dimension")?;
        put_f32s(buf, &self.data)
    }
}

impl Serialize for ArtifactFrame<'_> {
    fn serialize(&self, buf: &mut Vec<u8>) -> io::Result<()> {
        let start = buf.len();

        buf.extend_from_slice(&self.version.to_le_bytes());
        // Patched once the whole frame is written.
        buf.extend_from_slice(&[0; WIRE_INT_SIZE]);
        put_int(buf, self.layers.len(), "layer count")?;
        put_int(buf, self.tensors.len(), "tensor count")?;

        for layer in &self.layers {
            layer.serialize(buf)?;
        }

        for tensor in &self.tensors {
            tensor.serialize(buf)?;
        }

        let total_len = to_wire(buf.len() - start, "artifact length")?;
        let at = start + TOTAL_LEN_OFFSET;
        buf[at..at + WIRE_INT_SIZE].copy_from_slice(&total_len.to_le_bytes());
        Ok(())
    }
}

impl<'a> Deserialize<'a> for LayerRecord<'a> {
    fn deserialize(buf: &'a [u8]) -> io::Result<Self> {
        let mut reader = Reader::new(buf);
        let layer = read_layer(&mut reader)?;
        reader.finish()?;
        Ok(layer)
    }
}

impl<'a> Deserialize<'a> for ArtifactFrame<'a> {
    fn deserialize(buf: &'a [u8]) -> io::Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Self::invalid(format!(
                "the given buffer is too small {}, must at least be {HEADER_SIZE} bytes",
                buf.len()
            ));
        }

        let mut reader = Reader::new(buf);

        let version = reader.int()? as u32;
        if version != FORMAT_VERSION {
            return Self::invalid(format!(
                "unsupported artifact version {version}, expected {FORMAT_VERSION}"
            ));
        }

        let total_len = reader.int()?;
        if total_len != buf.len() {
            return Self::invalid(format!(
                "artifact declares {total_len} bytes but {} were received",
                buf.len()
            ));
        }

        let layer_count = reader.int()?;
        let tensor_count = reader.int()?;

        let layers = (0..layer_count)
            .map(|_| read_layer(&mut reader))
            .collect::<io::Result<Vec<_>>>()?;

        let tensors = (0..tensor_count)
            .map(|_| read_tensor(&mut reader))
            .collect::<io::Result<Vec<_>>>()?;

        reader.finish()?;

        for layer in &layers {
            if let Some(&idx) = layer.params.iter().find(|&&idx| idx >= tensor_count) {
                return Self::invalid(format!(
                    "layer {} references tensor {idx} but there are only {tensor_count}",
                    layer.name
                ));
            }
        }

        Ok(Self {
            version,
            layers,
            tensors,
        })
    }
}

fn read_layer<'a>(reader: &mut Reader<'a>) -> io::Result<LayerRecord<'a>> {
    Ok(LayerRecord {
        name: Cow::Borrowed(reader.str()?),
        kind: reader.int()? as u32,
        act_fn: reader.int()? as u32,
        attrs: reader.ints()?,
        input: reader.ints()?,
        output: reader.ints()?,
        params: reader.ints()?,
    })
}

fn read_tensor<'a>(reader: &mut Reader<'a>) -> io::Result<TensorRecord<'a>> {
    let name = reader.str()?;
    let shape = reader.ints()?;
    let data = reader.f32s()?;

    let numel = shape
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .unwrap_or(usize::MAX);

    if numel != data.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "tensor {name} has shape {shape:?} ({numel} values) but carries {}",
                data.len()
            ),
        ));
    }

    Ok(TensorRecord {
        name: Cow::Borrowed(name),
        shape,
        data: Cow::Owned(data),
    })
}
