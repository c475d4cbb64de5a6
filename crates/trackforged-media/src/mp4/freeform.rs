//! Freeform (`----`) iTunes tag atoms.
//!
//! One tag serializes as a `----` atom holding three children:
//!
//! ```text
//! [size]["----"]
//!   [size]["mean"][flags=0]["com.apple.iTunes"]
//!   [size]["name"][flags=0][tag name]
//!   [size]["data"][type=1][locale=0][UTF-8 value]
//! ```

use super::atoms::{locate_atom, read_atom_header, read_u32_at, write_header, HEADER_SIZE};
use crate::{Error, Result};

/// Reverse-DNS namespace written into every `mean` atom.
pub const ITUNES_MEAN: &str = "com.apple.iTunes";

/// Well-known type indicator for UTF-8 text in a `data` atom.
pub const DATA_TYPE_UTF8: u32 = 1;

const FREEFORM: &[u8; 4] = b"----";
const MEAN: &[u8; 4] = b"mean";
const NAME: &[u8; 4] = b"name";
const DATA: &[u8; 4] = b"data";

/// `mean` and `name` carry a 4-byte version/flags field before their text.
const FLAGS_LEN: usize = 4;
/// `data` carries a type indicator and a locale before its value.
const DATA_PREAMBLE_LEN: usize = 8;

/// A single custom tag destined for (or read from) an `ilst` atom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomTag {
    /// Upper-cased tag name, e.g. `REPLAYGAIN_TRACK_GAIN`.
    pub name: String,
    /// UTF-8 tag value, e.g. `-8.50 dB`.
    pub value: String,
}

impl CustomTag {
    /// Create a tag, normalizing the name to upper case.
    pub fn new(name: impl AsRef<str>, value: impl Into<String>) -> Self {
        Self {
            name: name.as_ref().to_uppercase(),
            value: value.into(),
        }
    }

    fn mean_len() -> usize {
        HEADER_SIZE + FLAGS_LEN + ITUNES_MEAN.len()
    }

    fn name_len(&self) -> usize {
        HEADER_SIZE + FLAGS_LEN + self.name.len()
    }

    fn data_len(&self) -> usize {
        HEADER_SIZE + DATA_PREAMBLE_LEN + self.value.len()
    }

    /// Total serialized length of the `----` atom.
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + Self::mean_len() + self.name_len() + self.data_len()
    }

    /// Append the serialized `----` atom to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        let total = atom_size(self.encoded_len())?;
        out.reserve(total as usize);

        write_header(out, total, FREEFORM);

        write_header(out, atom_size(Self::mean_len())?, MEAN);
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(ITUNES_MEAN.as_bytes());

        write_header(out, atom_size(self.name_len())?, NAME);
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(self.name.as_bytes());

        write_header(out, atom_size(self.data_len())?, DATA);
        out.extend_from_slice(&DATA_TYPE_UTF8.to_be_bytes());
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(self.value.as_bytes());

        Ok(())
    }

    /// Serialize into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Parse the `----` atom starting at `offset`.
    ///
    /// Children are located by type, so their order inside the atom does not
    /// matter. The `mean` namespace is not checked.
    pub fn parse(buf: &[u8], offset: usize) -> Result<Self> {
        let outer = read_atom_header(buf, offset).ok_or(Error::BufferUnderflow {
            need: offset + HEADER_SIZE,
            have: buf.len(),
        })?;
        if &outer.atom_type != FREEFORM {
            return Err(Error::malformed(format!(
                "expected '----', found '{}'",
                String::from_utf8_lossy(&outer.atom_type)
            )));
        }
        if outer.end() > buf.len() {
            return Err(Error::BufferUnderflow {
                need: outer.end(),
                have: buf.len(),
            });
        }

        let name = child_payload(buf, outer.payload_offset(), outer.end(), NAME, FLAGS_LEN)?;
        let value = child_payload(buf, outer.payload_offset(), outer.end(), DATA, DATA_PREAMBLE_LEN)?;

        let data_offset = locate_atom(buf, DATA, outer.payload_offset(), outer.end())
            .ok_or_else(|| Error::malformed("missing 'data'"))?;
        let data_type = read_u32_at(buf, data_offset + HEADER_SIZE).unwrap_or_default();
        if data_type != DATA_TYPE_UTF8 {
            return Err(Error::malformed(format!("unsupported data type {data_type}")));
        }

        Ok(Self {
            name: utf8(name, "name")?,
            value: utf8(value, "data")?,
        })
    }
}

/// Payload of the first `target` child in `[start, end)`, minus its preamble.
fn child_payload<'a>(
    buf: &'a [u8],
    start: usize,
    end: usize,
    target: &[u8; 4],
    preamble: usize,
) -> Result<&'a [u8]> {
    let label = String::from_utf8_lossy(target);
    let offset = locate_atom(buf, target, start, end)
        .ok_or_else(|| Error::malformed(format!("missing '{label}'")))?;
    let header = read_atom_header(buf, offset)
        .ok_or_else(|| Error::malformed(format!("truncated '{label}'")))?;
    if header.end() > end || header.payload_len() < preamble {
        return Err(Error::malformed(format!("'{label}' size {} out of bounds", header.size)));
    }
    Ok(&buf[header.payload_offset() + preamble..header.end()])
}

fn utf8(bytes: &[u8], field: &str) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| Error::malformed(format!("'{field}' is not UTF-8: {e}")))
}

fn atom_size(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::malformed(format!("atom of {len} bytes exceeds 32-bit size")))
}
