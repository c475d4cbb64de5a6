//! ISO BMFF atom header reading and navigation over in-memory buffers.
//!
//! Atoms are never materialized as owned trees. Every helper here reads or
//! writes the size/type fields directly at an offset into the caller's buffer.

/// Size of a compact atom header: 4-byte size plus 4-byte type.
pub const HEADER_SIZE: usize = 8;

/// Size of a fullbox version/flags field (`meta` carries one before its children).
pub const FULLBOX_FLAGS_SIZE: usize = 4;

/// A transient view of one atom header inside a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtomHeader {
    /// Offset of the atom's size field.
    pub offset: usize,
    /// Total size of the atom including the 8-byte header.
    pub size: u32,
    /// 4-byte atom type (e.g. b"moov").
    pub atom_type: [u8; 4],
}

impl AtomHeader {
    /// Offset of the first payload byte (just past the header).
    pub fn payload_offset(&self) -> usize {
        self.offset + HEADER_SIZE
    }

    /// Number of payload bytes (size - header).
    pub fn payload_len(&self) -> usize {
        (self.size as usize).saturating_sub(HEADER_SIZE)
    }

    /// Offset one past the last byte of this atom.
    pub fn end(&self) -> usize {
        self.offset + self.size as usize
    }
}

/// Read a big-endian u32 at `offset`, or `None` if the buffer is too short.
pub fn read_u32_at(buf: &[u8], offset: usize) -> Option<u32> {
    let bytes = buf.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Overwrite the big-endian u32 at `offset`.
///
/// Returns `false` (and leaves the buffer untouched) if the write would run
/// past the end of the buffer.
pub fn write_u32_at(buf: &mut [u8], offset: usize, value: u32) -> bool {
    match offset
        .checked_add(4)
        .and_then(|end| buf.get_mut(offset..end))
    {
        Some(slot) => {
            slot.copy_from_slice(&value.to_be_bytes());
            true
        }
        None => false,
    }
}

/// Read the atom header at `offset`.
///
/// Returns `None` if fewer than 8 bytes are available. The size is returned
/// as written; callers decide whether it is sane.
pub fn read_atom_header(buf: &[u8], offset: usize) -> Option<AtomHeader> {
    let size = read_u32_at(buf, offset)?;
    let type_bytes = buf.get(offset + 4..offset + HEADER_SIZE)?;
    Some(AtomHeader {
        offset,
        size,
        atom_type: [type_bytes[0], type_bytes[1], type_bytes[2], type_bytes[3]],
    })
}

/// Find the first sibling atom of type `target` in `[search_start, search_end)`.
///
/// Scans linearly: reads the size at the cursor, gives up on any size below 8
/// (this also rejects the 64-bit `size == 1` and to-end-of-file `size == 0`
/// forms), returns the cursor if the type matches, otherwise advances by
/// `size`. The scan ends once fewer than 8 bytes remain before `search_end`.
/// `search_end` is clamped to the buffer length.
pub fn locate_atom(
    buf: &[u8],
    target: &[u8; 4],
    search_start: usize,
    search_end: usize,
) -> Option<usize> {
    let end = search_end.min(buf.len());
    let mut pos = search_start;

    while end.saturating_sub(pos) >= HEADER_SIZE {
        let header = read_atom_header(buf, pos)?;
        if (header.size as usize) < HEADER_SIZE {
            return None;
        }
        if &header.atom_type == target {
            return Some(pos);
        }
        pos = pos.checked_add(header.size as usize)?;
    }

    None
}

/// Locate `target` within the payload of `parent`, skipping `skip` bytes of
/// parent-specific preamble (e.g. the fullbox flags of `meta`).
pub fn locate_child(buf: &[u8], parent: &AtomHeader, target: &[u8; 4], skip: usize) -> Option<AtomHeader> {
    let offset = locate_atom(buf, target, parent.payload_offset() + skip, parent.end())?;
    read_atom_header(buf, offset)
}

/// Append a compact atom header to `out`.
pub fn write_header(out: &mut Vec<u8>, size: u32, atom_type: &[u8; 4]) {
    out.extend_from_slice(&size.to_be_bytes());
    out.extend_from_slice(atom_type);
}
