//! Block tree of a FIF file.
//!
//! Tags between a `FIFF_BLOCK_START` and its matching `FIFF_BLOCK_END` belong
//! to that block; the block kind is the START tag's int payload.
use std::io::{Read, Seek};

use anyhow::{bail, Result};

use super::constants::*;
use super::tag::{read_directory, read_i32, read_tag_header, TagHeader};

#[derive(Debug, Default, Clone)]
pub struct Node {
    /// Block kind, 0 for the root.
    pub block: i32,
    /// Non-structural tags directly inside this block.
    pub entries: Vec<TagHeader>,
    pub children: Vec<Node>,
}

impl Node {
    /// Depth-first search including `self`.
    pub fn find_block(&self, kind: i32) -> Option<&Node> {
        if self.block == kind {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_block(kind))
    }

    /// First direct entry of the given kind.
    pub fn find_tag(&self, kind: i32) -> Option<&TagHeader> {
        self.entries.iter().find(|e| e.kind == kind)
    }
}

/// Group a flat, file-ordered directory into blocks.
pub fn read_tree<R: Read + Seek>(reader: &mut R, directory: &[TagHeader]) -> Result<Node> {
    let mut stack = vec![Node::default()];
    for tag in directory {
        match tag.kind {
            FIFF_BLOCK_START => {
                let block = read_i32(reader, tag)?;
                stack.push(Node { block, ..Node::default() });
            }
            FIFF_BLOCK_END => {
                if stack.len() < 2 {
                    bail!("unbalanced FIFF_BLOCK_END @ {:#x}", tag.pos);
                }
                if let Some(done) = stack.pop() {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(done);
                    }
                }
            }
            _ => {
                if let Some(node) = stack.last_mut() {
                    node.entries.push(*tag);
                }
            }
        }
    }
    // Truncated files may leave blocks open; attach them to their parents.
    while stack.len() > 1 {
        if let Some(open) = stack.pop() {
            if let Some(parent) = stack.last_mut() {
                parent.children.push(open);
            }
        }
    }
    Ok(stack.pop().unwrap_or_default())
}

/// Follow the `next` chain from offset 0.
pub fn scan_directory<R: Read + Seek>(reader: &mut R) -> Result<Vec<TagHeader>> {
    let mut directory = Vec::new();
    let mut pos = Some(0);
    while let Some(p) = pos {
        let tag = read_tag_header(reader, p)?;
        pos = tag.next_pos();
        directory.push(tag);
    }
    Ok(directory)
}

/// The directory stored at the end of the file, if the second tag points to
/// one. `None` means the caller should [`scan_directory`].
pub fn try_load_directory<R: Read + Seek>(reader: &mut R) -> Result<Option<Vec<TagHeader>>> {
    let id = read_tag_header(reader, 0)?;
    if id.kind != FIFF_FILE_ID {
        bail!("not a FIF file: first tag is {} (expected FIFF_FILE_ID)", id.kind);
    }
    let Some(next) = id.next_pos() else { return Ok(None) };
    let ptr = read_tag_header(reader, next)?;
    if ptr.kind != FIFF_DIR_POINTER {
        return Ok(None);
    }
    let dirpos = read_i32(reader, &ptr)?;
    if dirpos <= 0 {
        return Ok(None);
    }
    let dir = read_tag_header(reader, dirpos as u64)?;
    if dir.ftype != FIFFT_DIR_ENTRY_STRUCT {
        return Ok(None);
    }
    read_directory(reader, &dir).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fiff::testutil::FifBuilder;
    use std::io::Cursor;

    #[test]
    fn nested_blocks_are_resolved() {
        let mut b = FifBuilder::new();
        b.start_block(FIFFB_MEAS);
        b.start_block(FIFFB_MEAS_INFO);
        b.int(FIFF_NCHAN, 3);
        b.end_block(FIFFB_MEAS_INFO);
        b.int(FIFF_FIRST_SAMPLE, 0);
        b.end_block(FIFFB_MEAS);
        let mut cur = Cursor::new(b.finish());

        let dir = scan_directory(&mut cur).unwrap();
        let root = read_tree(&mut cur, &dir).unwrap();
        let meas = root.find_block(FIFFB_MEAS).unwrap();
        assert!(meas.find_tag(FIFF_FIRST_SAMPLE).is_some());
        let info = meas.find_block(FIFFB_MEAS_INFO).unwrap();
        assert_eq!(info.entries.len(), 1);
        assert!(root.find_block(FIFFB_RAW_DATA).is_none());
    }

    #[test]
    fn file_without_directory_pointer_falls_back() {
        let mut b = FifBuilder::new();
        b.int(FIFF_NCHAN, 1);
        let mut cur = Cursor::new(b.finish());
        assert!(try_load_directory(&mut cur).unwrap().is_none());
    }

    #[test]
    fn non_fif_is_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&7_i32.to_be_bytes());
        bytes.extend_from_slice(&[0u8; 12]);
        assert!(try_load_directory(&mut Cursor::new(bytes)).is_err());
    }
}
