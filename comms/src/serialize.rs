use std::io;

use crate::WireInt;

/// Types that can write themselves into the artifact wire format.
pub trait Serialize {
    /// Appends the encoded form of `self` at the end of `buf`.
    ///
    /// # Arguments
    /// * `buf` - The output buffer, it is never cleared.
    ///
    /// # Returns
    /// An `io::Error` if some integer does not fit the wire integer width.
    fn serialize(&self, buf: &mut Vec<u8>) -> io::Result<()>;
}

/// Converts `n` into a wire integer.
///
/// # Arguments
/// * `n` - The value to convert.
/// * `what` - What the value represents, used in the error message.
///
/// # Returns
/// The wire integer or an error if it doesn't fit.
pub(crate) fn to_wire(n: usize, what: &str) -> io::Result<WireInt> {
    WireInt::try_from(n).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{what} ({n}) does not fit in a {}-bit wire integer", WireInt::BITS),
        )
    })
}

pub(crate) fn put_int(buf: &mut Vec<u8>, n: usize, what: &str) -> io::Result<()> {
    let n = to_wire(n, what)?;
    buf.extend_from_slice(&n.to_le_bytes());
    Ok(())
}

pub(crate) fn put_str(buf: &mut Vec<u8>, s: &str) -> io::Result<()> {
    put_int(buf, s.len(), "string length")?;
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

/// Writes a count prefixed sequence of integers, used for shapes, attributes and indices.
pub(crate) fn put_ints(buf: &mut Vec<u8>, ns: &[usize], what: &str) -> io::Result<()> {
    put_int(buf, ns.len(), what)?;
    ns.iter().try_for_each(|&n| put_int(buf, n, what))
}

/// Writes the byte length of `data` followed by its little endian encoding.
pub(crate) fn put_f32s(buf: &mut Vec<u8>, data: &[f32]) -> io::Result<()> {
    put_int(buf, size_of_val(data), "payload length")?;

    if cfg!(target_endian = "little") {
        buf.extend_from_slice(bytemuck::cast_slice(data));
    } else {
        buf.reserve(size_of_val(data));
        for x in data {
            buf.extend_from_slice(&x.to_le_bytes());
        }
    }

    Ok(())
}
