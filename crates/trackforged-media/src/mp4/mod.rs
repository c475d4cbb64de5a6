//! MP4/M4A metadata patching.
//!
//! Injects freeform `----` tag atoms at the end of an existing
//! `moov/udta/meta/ilst` chain and grows the four ancestor size fields by the
//! number of inserted bytes. Atom headers never move; only the bytes after
//! the end of `ilst` shift forward.

pub mod atoms;
pub mod freeform;

use std::borrow::Cow;

use atoms::{locate_atom, locate_child, read_atom_header, AtomHeader, FULLBOX_FLAGS_SIZE, HEADER_SIZE};
pub use freeform::{CustomTag, ITUNES_MEAN};

/// Offsets of the nested metadata atoms, outermost first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IlstChain {
    pub moov: AtomHeader,
    pub udta: AtomHeader,
    pub meta: AtomHeader,
    pub ilst: AtomHeader,
}

impl IlstChain {
    /// `[ilst, meta, udta, moov]`, innermost first.
    pub fn headers(&self) -> [&AtomHeader; 4] {
        [&self.ilst, &self.meta, &self.udta, &self.moov]
    }
}

/// Descend `moov → udta → meta → ilst`.
///
/// Returns `None` if any link is missing, or if a child claims to extend past
/// its parent or past the end of the buffer.
pub fn locate_ilst_chain(buf: &[u8]) -> Option<IlstChain> {
    let moov = read_atom_header(buf, locate_atom(buf, b"moov", 0, buf.len())?)?;
    let udta = locate_child(buf, &moov, b"udta", 0)?;
    let meta = locate_child(buf, &udta, b"meta", 0)?;
    let ilst = locate_child(buf, &meta, b"ilst", FULLBOX_FLAGS_SIZE)?;

    let contained = moov.end() <= buf.len()
        && udta.end() <= moov.end()
        && meta.end() <= udta.end()
        && ilst.end() <= meta.end();
    if !contained {
        tracing::warn!(
            "metadata atoms overrun their parents (moov={}+{}, udta={}+{}, meta={}+{}, ilst={}+{})",
            moov.offset,
            moov.size,
            udta.offset,
            udta.size,
            meta.offset,
            meta.size,
            ilst.offset,
            ilst.size
        );
        return None;
    }

    Some(IlstChain {
        moov,
        udta,
        meta,
        ilst,
    })
}

/// Relative placement of the top-level `moov` and `mdat` atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoovPlacement {
    /// `moov` follows `mdat`; growing `moov` moves no sample data.
    AfterMdat,
    /// `moov` precedes `mdat`; growing `moov` shifts sample data while
    /// absolute `stco`/`co64` chunk offsets stay unchanged.
    BeforeMdat,
    /// No top-level `mdat` was found (e.g. a fragmented file).
    NoMdat,
}

/// Classify where `moov` sits relative to `mdat`.
pub fn moov_placement(buf: &[u8], moov_offset: usize) -> MoovPlacement {
    match locate_atom(buf, b"mdat", 0, buf.len()) {
        Some(mdat) if mdat > moov_offset => MoovPlacement::BeforeMdat,
        Some(_) => MoovPlacement::AfterMdat,
        None => MoovPlacement::NoMdat,
    }
}

/// Append one freeform atom per tag with a non-empty value to `ilst`.
///
/// Returns `Cow::Borrowed(buf)` unchanged when the `moov/udta/meta/ilst`
/// chain is incomplete or when no tag has a value; that is the normal outcome
/// for files without existing metadata atoms. Otherwise returns a new buffer
/// of `buf.len() + inserted` bytes with the `ilst`, `meta`, `udta` and `moov`
/// sizes each grown by `inserted`. The input is never modified.
///
/// If `moov` precedes `mdat`, a warning is logged and the patch still
/// proceeds; chunk offset tables are not rewritten.
pub fn inject_tags<I, K, V>(buf: &[u8], tags: I) -> Cow<'_, [u8]>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let Some(chain) = locate_ilst_chain(buf) else {
        tracing::debug!("no moov/udta/meta/ilst chain; leaving container untouched");
        return Cow::Borrowed(buf);
    };

    let mut insertion = Vec::new();
    for (key, value) in tags {
        let value = value.as_ref();
        if value.is_empty() {
            continue;
        }
        let tag = CustomTag::new(key, value);
        if let Err(e) = tag.write_to(&mut insertion) {
            tracing::warn!("skipping tag injection: {e}");
            return Cow::Borrowed(buf);
        }
        tracing::trace!("queued custom atom {} ({} bytes)", tag.name, tag.encoded_len());
    }

    let inserted = insertion.len();
    if inserted == 0 {
        return Cow::Borrowed(buf);
    }

    let Some(new_sizes) = grown_sizes(&chain, inserted) else {
        tracing::warn!(
            "inserting {inserted} bytes would overflow a 32-bit atom size; leaving container untouched"
        );
        return Cow::Borrowed(buf);
    };

    if moov_placement(buf, chain.moov.offset) == MoovPlacement::BeforeMdat {
        tracing::warn!(
            "moov at offset {} precedes mdat; stco/co64 chunk offsets are not adjusted for the {} inserted bytes",
            chain.moov.offset,
            inserted
        );
    }

    let splice_at = chain.ilst.end();
    let mut out = Vec::with_capacity(buf.len() + inserted);
    out.extend_from_slice(&buf[..splice_at]);
    out.extend_from_slice(&insertion);
    out.extend_from_slice(&buf[splice_at..]);

    for (header, size) in chain.headers().into_iter().zip(new_sizes) {
        // Headers sit before the splice point, so their offsets are unchanged.
        atoms::write_u32_at(&mut out, header.offset, size);
    }

    tracing::debug!(
        "injected {inserted} bytes of custom atoms after ilst at offset {}",
        chain.ilst.offset
    );

    Cow::Owned(out)
}

/// New sizes for `[ilst, meta, udta, moov]`, or `None` on overflow.
fn grown_sizes(chain: &IlstChain, inserted: usize) -> Option<[u32; 4]> {
    let inserted = u32::try_from(inserted).ok()?;
    let [ilst, meta, udta, moov] = chain.headers();
    Some([
        ilst.size.checked_add(inserted)?,
        meta.size.checked_add(inserted)?,
        udta.size.checked_add(inserted)?,
        moov.size.checked_add(inserted)?,
    ])
}

/// List every freeform tag in `moov/udta/meta/ilst`, in file order.
///
/// Children of `ilst` that are not `----` atoms, or that fail to parse, are
/// skipped.
pub fn read_custom_tags(buf: &[u8]) -> Vec<CustomTag> {
    let Some(chain) = locate_ilst_chain(buf) else {
        return Vec::new();
    };

    let mut tags = Vec::new();
    let mut pos = chain.ilst.payload_offset();
    let end = chain.ilst.end();

    while end.saturating_sub(pos) >= HEADER_SIZE {
        let Some(header) = read_atom_header(buf, pos) else {
            break;
        };
        if (header.size as usize) < HEADER_SIZE {
            break;
        }
        if &header.atom_type == b"----" {
            match CustomTag::parse(buf, pos) {
                Ok(tag) => tags.push(tag),
                Err(e) => tracing::debug!("skipping unreadable freeform atom at {pos}: {e}"),
            }
        }
        pos += header.size as usize;
    }

    tags
}

#[cfg(test)]
mod tests {
    use super::atoms::{read_u32_at, write_header};
    use super::*;

    fn atom(atom_type: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        write_header(&mut out, (HEADER_SIZE + payload.len()) as u32, atom_type);
        out.extend_from_slice(payload);
        out
    }

    /// ftyp + mdat + moov(mvhd, udta(meta(flags, hdlr, ilst(©nam))))
    fn sample_m4a() -> Vec<u8> {
        let nam = atom(b"\xa9nam", &atom(b"data", &[0, 0, 0, 1, 0, 0, 0, 0, b'h', b'i']));
        let ilst = atom(b"ilst", &nam);
        let mut meta_payload = vec![0u8; 4];
        meta_payload.extend(atom(b"hdlr", &[0u8; 25]));
        meta_payload.extend(&ilst);
        let meta = atom(b"meta", &meta_payload);
        let udta = atom(b"udta", &meta);
        let mut moov_payload = atom(b"mvhd", &[0u8; 100]);
        moov_payload.extend(&udta);
        let moov = atom(b"moov", &moov_payload);

        let mut file = atom(b"ftyp", b"M4A \0\0\0\0");
        file.extend(atom(b"mdat", &[0x55; 64]));
        file.extend(moov);
        file
    }

    fn sizes(buf: &[u8], chain: &IlstChain) -> [u32; 4] {
        [
            read_u32_at(buf, chain.moov.offset).unwrap(),
            read_u32_at(buf, chain.udta.offset).unwrap(),
            read_u32_at(buf, chain.meta.offset).unwrap(),
            read_u32_at(buf, chain.ilst.offset).unwrap(),
        ]
    }

    #[test]
    fn test_locate_ilst_chain() {
        let file = sample_m4a();
        let chain = locate_ilst_chain(&file).unwrap();
        assert_eq!(&chain.moov.atom_type, b"moov");
        assert_eq!(&chain.udta.atom_type, b"udta");
        assert_eq!(&chain.meta.atom_type, b"meta");
        assert_eq!(&chain.ilst.atom_type, b"ilst");
        assert_eq!(chain.moov.end(), file.len());
    }

    #[test]
    fn test_inject_grows_all_ancestors() {
        let file = sample_m4a();
        let before = locate_ilst_chain(&file).unwrap();
        let [m, u, e, i] = sizes(&file, &before);

        let patched = inject_tags(&file, [("REPLAYGAIN_TRACK_GAIN", "-8.50 dB")]);
        assert!(matches!(patched, Cow::Owned(_)));
        let k = 93u32;
        assert_eq!(patched.len(), file.len() + k as usize);
        assert_eq!(sizes(&patched, &before), [m + k, u + k, e + k, i + k]);

        // Existing ilst children are preserved in front of the new atom.
        let splice = before.ilst.end();
        assert_eq!(&patched[..splice], &file[..splice]);
        assert_eq!(&patched[splice + k as usize..], &file[splice..]);

        let after = locate_ilst_chain(&patched).unwrap();
        assert_eq!(after.ilst.offset, before.ilst.offset);
        assert_eq!(after.moov.end(), patched.len());
    }

    #[test]
    fn test_inject_then_read_back() {
        let file = sample_m4a();
        let patched = inject_tags(
            &file,
            vec![
                ("replaygain_track_gain".to_string(), "-8.50 dB".to_string()),
                ("REPLAYGAIN_TRACK_PEAK".to_string(), "0.988553".to_string()),
            ],
        );
        let tags = read_custom_tags(&patched);
        assert_eq!(
            tags,
            vec![
                CustomTag::new("REPLAYGAIN_TRACK_GAIN", "-8.50 dB"),
                CustomTag::new("REPLAYGAIN_TRACK_PEAK", "0.988553"),
            ]
        );
        assert!(read_custom_tags(&file).is_empty());
    }

    #[test]
    fn test_inject_is_repeatable() {
        let file = sample_m4a();
        let once = inject_tags(&file, [("A", "1")]).into_owned();
        let twice = inject_tags(&once, [("B", "2")]).into_owned();
        let names: Vec<_> = read_custom_tags(&twice).into_iter().map(|t| t.name).collect();
        assert_eq!(names, ["A", "B"]);
    }

    #[test]
    fn test_missing_udta_is_noop() {
        let mut file = atom(b"ftyp", b"M4A \0\0\0\0");
        file.extend(atom(b"moov", &atom(b"mvhd", &[0u8; 100])));
        let patched = inject_tags(&file, [("REPLAYGAIN_TRACK_GAIN", "-8.50 dB")]);
        assert!(matches!(patched, Cow::Borrowed(_)));
        assert_eq!(&*patched, &file[..]);
    }

    #[test]
    fn test_missing_moov_is_noop() {
        let file = atom(b"ftyp", b"M4A \0\0\0\0");
        let patched = inject_tags(&file, [("K", "v")]);
        assert_eq!(&*patched, &file[..]);
    }

    #[test]
    fn test_meta_without_ilst_is_noop() {
        let mut meta_payload = vec![0u8; 4];
        meta_payload.extend(atom(b"hdlr", &[0u8; 25]));
        let file = atom(b"moov", &atom(b"udta", &atom(b"meta", &meta_payload)));
        let patched = inject_tags(&file, [("K", "v")]);
        assert!(matches!(patched, Cow::Borrowed(_)));
    }

    #[test]
    fn test_empty_values_are_noop() {
        let file = sample_m4a();
        let patched = inject_tags(&file, [("REPLAYGAIN_TRACK_GAIN", ""), ("REPLAYGAIN_TRACK_PEAK", "")]);
        assert!(matches!(patched, Cow::Borrowed(_)));
        assert_eq!(&*patched, &file[..]);
    }

    #[test]
    fn test_empty_values_are_skipped_among_others() {
        let file = sample_m4a();
        let patched = inject_tags(&file, [("EMPTY", ""), ("KEEP", "x")]);
        let tags = read_custom_tags(&patched);
        assert_eq!(tags, vec![CustomTag::new("KEEP", "x")]);
    }

    #[test]
    fn test_overrunning_child_is_noop() {
        let mut file = sample_m4a();
        let chain = locate_ilst_chain(&file).unwrap();
        // Claim ilst is larger than its meta parent.
        atoms::write_u32_at(&mut file, chain.ilst.offset, chain.meta.size + 8);
        assert!(locate_ilst_chain(&file).is_none());
        assert!(matches!(inject_tags(&file, [("K", "v")]), Cow::Borrowed(_)));
    }

    #[test]
    fn test_moov_placement() {
        let file = sample_m4a();
        let chain = locate_ilst_chain(&file).unwrap();
        assert_eq!(moov_placement(&file, chain.moov.offset), MoovPlacement::AfterMdat);

        let mut faststart = atom(b"ftyp", b"M4A \0\0\0\0");
        let moov_offset = faststart.len();
        faststart.extend(atom(b"moov", &[]));
        faststart.extend(atom(b"mdat", &[0u8; 16]));
        assert_eq!(moov_placement(&faststart, moov_offset), MoovPlacement::BeforeMdat);

        let fragmented = atom(b"moov", &[]);
        assert_eq!(moov_placement(&fragmented, 0), MoovPlacement::NoMdat);
    }

    #[test]
    fn test_moov_before_mdat_still_patched() {
        let ilst = atom(b"ilst", &[]);
        let mut meta_payload = vec![0u8; 4];
        meta_payload.extend(&ilst);
        let moov = atom(b"moov", &atom(b"udta", &atom(b"meta", &meta_payload)));
        let mut file = moov;
        file.extend(atom(b"mdat", &[1, 2, 3, 4]));

        let patched = inject_tags(&file, [("K", "v")]);
        assert!(matches!(patched, Cow::Owned(_)));
        assert_eq!(&patched[patched.len() - 12..], &file[file.len() - 12..]);
    }
}
