//! Decoder for the flattened device tree binary format.
//!
//! The decoder turns a blob into an owned node graph. It validates just enough of the
//! layout to walk it safely: header magic and version, block bounds, the token stream
//! and string table offsets.

use std::{ffi::CStr, ops::Range, str};

use log::trace;
use serde::Serialize;

use crate::error::FdtError;

mod parser;

use parser::{Token, FDT_MAGIC, HEADER_SIZE};

/// Deepest node nesting accepted by the decoder, the root counting as one level.
///
/// Node graphs are dropped, compared and walked recursively, so blobs nesting deeper
/// than this are rejected while decoding.
pub const MAX_DEPTH: usize = 64;

/// The header found at the start of every device tree blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Header {
    pub magic: u32,
    pub total_size: u32,
    pub off_dt_struct: u32,
    pub off_dt_strings: u32,
    pub off_mem_rsvmap: u32,
    pub version: u32,
    pub last_comp_version: u32,
    pub boot_cpuid_phys: u32,
    pub size_dt_strings: u32,
    pub size_dt_struct: u32,
}

/// An entry of the memory reservation block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryReservation {
    pub address: u64,
    pub size: u64,
}

/// A decoded device tree blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fdt {
    header: Header,
    reservations: Vec<MemoryReservation>,
    root: FdtNode,
}

/// A node of the decoded blob, with its properties still in raw form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FdtNode {
    name: String,
    props: Vec<(String, Vec<u8>)>,
    children: Vec<FdtNode>,
}

impl FdtNode {
    /// The unit name of this node, empty for the root.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Direct children, in the order they appear in the blob.
    pub fn subnodes(&self) -> impl Iterator<Item = &FdtNode> {
        self.children.iter()
    }

    /// Properties as `(name, raw value)` pairs, in the order they appear in the blob.
    pub fn props(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.props
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_slice()))
    }

    /// Look up a property by name.
    ///
    /// Returns `None` if the node has no such property. An empty property yields an
    /// empty slice.
    pub fn property(&self, name: &str) -> Option<&[u8]> {
        self.props
            .iter()
            .rev()
            .find(|(prop, _)| prop == name)
            .map(|(_, value)| value.as_slice())
    }
}

impl Fdt {
    /// Decode a device tree blob.
    pub fn parse(blob: &[u8]) -> Result<Self, FdtError> {
        let header = match parser::header(blob) {
            Ok((_, header)) => header,
            Err(_) => return Err(FdtError::Truncated(HEADER_SIZE, blob.len())),
        };

        if header.magic != FDT_MAGIC {
            return Err(FdtError::BadMagic(header.magic));
        }
        if header.version < 16 || header.last_comp_version > 17 {
            return Err(FdtError::UnsupportedVersion(
                header.version,
                header.last_comp_version,
            ));
        }

        let total_size = header.total_size as usize;
        if total_size > blob.len() {
            return Err(FdtError::Truncated(total_size, blob.len()));
        }
        let blob = &blob[..total_size];

        let struct_end = if header.version >= 17 {
            header.off_dt_struct as usize + header.size_dt_struct as usize
        } else {
            total_size
        };
        let structure = block(blob, "structure", header.off_dt_struct as usize..struct_end)?;
        let strings = block(
            blob,
            "strings",
            header.off_dt_strings as usize
                ..header.off_dt_strings as usize + header.size_dt_strings as usize,
        )?;
        let rsvmap = block(
            blob,
            "memory reservation",
            header.off_mem_rsvmap as usize..total_size,
        )?;

        let reservations = match parser::reservations(rsvmap) {
            Ok((_, reservations)) => reservations,
            Err(_) => return Err(FdtError::BadReservationBlock),
        };

        let root = structure_block(structure, Strings(strings))?;

        Ok(Self {
            header,
            reservations,
            root,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn reservations(&self) -> &[MemoryReservation] {
        &self.reservations
    }

    pub fn root(&self) -> &FdtNode {
        &self.root
    }
}

fn block<'a>(
    blob: &'a [u8],
    name: &'static str,
    range: Range<usize>,
) -> Result<&'a [u8], FdtError> {
    blob.get(range.clone()).ok_or(FdtError::BlockOutOfBounds {
        block: name,
        start: range.start,
        end: range.end,
        total_size: blob.len(),
    })
}

/// The strings block, indexed by property name offsets.
struct Strings<'a>(&'a [u8]);

impl<'a> Strings<'a> {
    fn get(&self, offset: u32) -> Result<&'a str, FdtError> {
        let offset = offset as usize;
        let bytes = self
            .0
            .get(offset..)
            .and_then(|tail| CStr::from_bytes_until_nul(tail).ok())
            .ok_or(FdtError::BadString(offset))?;

        bytes.to_str().map_err(|_| FdtError::BadName(offset))
    }
}

/// Rebuild the node hierarchy from the token stream of the structure block.
///
/// Open nodes are kept on an explicit stack that never grows past [`MAX_DEPTH`].
fn structure_block(block: &[u8], strings: Strings) -> Result<FdtNode, FdtError> {
    let mut input = block;
    let mut open: Vec<FdtNode> = Vec::new();
    let mut root = None;

    loop {
        let offset = block.len() - input.len();
        let (rest, token) = parser::token(input).map_err(|_| FdtError::BadToken(offset))?;
        input = rest;

        match token {
            Token::BeginNode(name) => {
                if root.is_some() {
                    return Err(FdtError::BadStructure(offset, "multiple root nodes"));
                }
                if open.len() == MAX_DEPTH {
                    return Err(FdtError::TooDeep(offset, MAX_DEPTH));
                }
                let name = str::from_utf8(name).map_err(|_| FdtError::BadName(offset))?;
                trace!("node '{}' at offset {:#x}", name, offset);

                open.push(FdtNode {
                    name: name.to_string(),
                    ..Default::default()
                });
            }
            Token::EndNode => {
                let node = open
                    .pop()
                    .ok_or(FdtError::BadStructure(offset, "unbalanced node end"))?;

                match open.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = Some(node),
                }
            }
            Token::Prop { name_offset, value } => {
                let name = strings.get(name_offset)?;
                let node = open
                    .last_mut()
                    .ok_or(FdtError::BadStructure(offset, "property outside of a node"))?;

                node.props.push((name.to_string(), value.to_vec()));
            }
            Token::Nop => {}
            Token::End => break,
        }
    }

    if !open.is_empty() {
        let offset = block.len() - input.len();
        return Err(FdtError::BadStructure(offset, "unterminated node"));
    }

    root.ok_or(FdtError::BadStructure(0, "no root node"))
}
