//! FIFF tag headers and payload readers.
//!
//! Every tag is a 16-byte big-endian header followed by `size` payload bytes:
//!
//! ```text
//! kind: i32 | type: u32 | size: i32 | next: i32 | payload...
//! ```
//!
//! `next == 0` means the following tag starts right after the payload,
//! `next > 0` is an absolute file offset and `next == -1` ends the chain.
use std::io::{Read, Seek, SeekFrom};

use anyhow::{bail, ensure, Context, Result};

use super::constants::*;

pub const TAG_HEADER_LEN: u64 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagHeader {
    pub kind: i32,
    pub ftype: u32,
    pub size: i32,
    pub next: i32,
    /// Byte offset of the header.
    pub pos: u64,
}

impl TagHeader {
    #[inline]
    pub fn data_pos(&self) -> u64 {
        self.pos + TAG_HEADER_LEN
    }

    #[inline]
    pub fn payload_len(&self) -> usize {
        self.size.max(0) as usize
    }

    pub fn next_pos(&self) -> Option<u64> {
        match self.next {
            FIFFV_NEXT_SEQ => Some(self.data_pos() + self.payload_len() as u64),
            n if n > 0 => Some(n as u64),
            _ => None,
        }
    }
}

/// Big-endian `i32` at `off`. Callers check the slice length first.
#[inline]
pub(crate) fn be_i32(b: &[u8], off: usize) -> i32 {
    i32::from_be_bytes([b[off], b[off + 1], b[off + 2], b[off + 3]])
}

#[inline]
pub(crate) fn be_u32(b: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([b[off], b[off + 1], b[off + 2], b[off + 3]])
}

#[inline]
pub(crate) fn be_f32(b: &[u8], off: usize) -> f32 {
    f32::from_bits(be_u32(b, off))
}

fn header_from_bytes(buf: &[u8; 16], pos: u64) -> TagHeader {
    TagHeader {
        kind: be_i32(buf, 0),
        ftype: be_u32(buf, 4),
        size: be_i32(buf, 8),
        next: be_i32(buf, 12),
        pos,
    }
}

pub fn read_tag_header<R: Read + Seek>(reader: &mut R, pos: u64) -> Result<TagHeader> {
    reader
        .seek(SeekFrom::Start(pos))
        .with_context(|| format!("seek to tag header @ {pos:#x}"))?;
    let mut buf = [0u8; 16];
    reader
        .read_exact(&mut buf)
        .with_context(|| format!("read tag header @ {pos:#x}"))?;
    Ok(header_from_bytes(&buf, pos))
}

/// Whole payload as bytes.
pub fn read_payload<R: Read + Seek>(reader: &mut R, tag: &TagHeader) -> Result<Vec<u8>> {
    reader
        .seek(SeekFrom::Start(tag.data_pos()))
        .with_context(|| format!("seek to tag data @ {:#x}", tag.data_pos()))?;
    let mut buf = vec![0u8; tag.payload_len()];
    reader
        .read_exact(&mut buf)
        .with_context(|| format!("read {} payload bytes of tag {}", buf.len(), tag.kind))?;
    Ok(buf)
}

pub fn read_i32<R: Read + Seek>(reader: &mut R, tag: &TagHeader) -> Result<i32> {
    let b = read_payload(reader, tag)?;
    ensure!(b.len() >= 4, "tag {} too short for an int", tag.kind);
    Ok(be_i32(&b, 0))
}

pub fn read_i32_array<R: Read + Seek>(reader: &mut R, tag: &TagHeader) -> Result<Vec<i32>> {
    let b = read_payload(reader, tag)?;
    Ok(b.chunks_exact(4).map(|c| be_i32(c, 0)).collect())
}

/// A float tag, accepting either single or double precision.
pub fn read_f64<R: Read + Seek>(reader: &mut R, tag: &TagHeader) -> Result<f64> {
    let b = read_payload(reader, tag)?;
    match (tag.ftype, b.len()) {
        (FIFFT_FLOAT, n) if n >= 4 => Ok(be_f32(&b, 0) as f64),
        (FIFFT_DOUBLE, n) if n >= 8 => {
            let mut w = [0u8; 8];
            w.copy_from_slice(&b[..8]);
            Ok(f64::from_be_bytes(w))
        }
        (t, n) => bail!("tag {} has type {t} / {n} bytes, expected a float", tag.kind),
    }
}

pub fn read_f32_array<R: Read + Seek>(reader: &mut R, tag: &TagHeader) -> Result<Vec<f32>> {
    let b = read_payload(reader, tag)?;
    Ok(b.chunks_exact(4).map(|c| be_f32(c, 0)).collect())
}

/// Latin-1 text.
pub fn read_string<R: Read + Seek>(reader: &mut R, tag: &TagHeader) -> Result<String> {
    let b = read_payload(reader, tag)?;
    Ok(b.iter().take_while(|&&c| c != 0).map(|&c| c as char).collect())
}

/// Entries of a `FIFFT_DIR_ENTRY_STRUCT` tag. Each is laid out like a tag
/// header whose last field is the tag's absolute position.
pub fn read_directory<R: Read + Seek>(reader: &mut R, tag: &TagHeader) -> Result<Vec<TagHeader>> {
    ensure!(
        tag.ftype == FIFFT_DIR_ENTRY_STRUCT,
        "expected a directory tag, got type {}",
        tag.ftype
    );
    let b = read_payload(reader, tag)?;
    Ok(b.chunks_exact(16)
        .map(|c| TagHeader {
            kind: be_i32(c, 0),
            ftype: be_u32(c, 4),
            size: be_i32(c, 8),
            next: FIFFV_NEXT_NONE,
            pos: be_u32(c, 12) as u64,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn tag_bytes(kind: i32, ftype: u32, payload: &[u8], next: i32) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(&kind.to_be_bytes());
        b.extend_from_slice(&ftype.to_be_bytes());
        b.extend_from_slice(&(payload.len() as i32).to_be_bytes());
        b.extend_from_slice(&next.to_be_bytes());
        b.extend_from_slice(payload);
        b
    }

    #[test]
    fn int_tag() {
        let mut cur = Cursor::new(tag_bytes(FIFF_NCHAN, FIFFT_INT, &16_i32.to_be_bytes(), 0));
        let tag = read_tag_header(&mut cur, 0).unwrap();
        assert_eq!((tag.kind, tag.ftype, tag.size), (FIFF_NCHAN, FIFFT_INT, 4));
        assert_eq!(read_i32(&mut cur, &tag).unwrap(), 16);
        assert_eq!(tag.next_pos(), Some(20));
    }

    #[test]
    fn float_and_double_sfreq() {
        let mut cur = Cursor::new(tag_bytes(FIFF_SFREQ, FIFFT_FLOAT, &250_f32.to_be_bytes(), -1));
        let tag = read_tag_header(&mut cur, 0).unwrap();
        approx::assert_abs_diff_eq!(read_f64(&mut cur, &tag).unwrap(), 250.0);
        assert_eq!(tag.next_pos(), None);

        let mut cur = Cursor::new(tag_bytes(FIFF_SFREQ, FIFFT_DOUBLE, &125.5_f64.to_be_bytes(), -1));
        let tag = read_tag_header(&mut cur, 0).unwrap();
        approx::assert_abs_diff_eq!(read_f64(&mut cur, &tag).unwrap(), 125.5);
    }

    #[test]
    fn string_stops_at_nul() {
        let mut cur = Cursor::new(tag_bytes(FIFF_COMMENT, FIFFT_STRING, b"True-SSVEP-1\0\0", -1));
        let tag = read_tag_header(&mut cur, 0).unwrap();
        assert_eq!(read_string(&mut cur, &tag).unwrap(), "True-SSVEP-1");
    }

    #[test]
    fn truncated_payload_is_an_error() {
        let mut bytes = tag_bytes(FIFF_NCHAN, FIFFT_INT, &[0, 0, 0, 4], 0);
        bytes.truncate(18);
        let mut cur = Cursor::new(bytes);
        let tag = read_tag_header(&mut cur, 0).unwrap();
        assert!(read_i32(&mut cur, &tag).is_err());
    }

    #[test]
    fn explicit_next_pointer() {
        let tag = TagHeader { kind: 1, ftype: 3, size: 8, next: 5000, pos: 100 };
        assert_eq!(tag.next_pos(), Some(5000));
    }
}
