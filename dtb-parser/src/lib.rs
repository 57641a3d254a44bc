//! Parser for Device Tree Blobs (DTB).
//!
//! A [`DtbParser`] decodes a flattened device tree and offers several views on it: a
//! tree of [`Node`]s, a tree of [`NodeRecord`]s with unit addresses split out, the
//! root `compatible` list, and phandle resolution.
//!
//! ```no_run
//! use dtb_parser::DtbParser;
//!
//! let dtb = DtbParser::from_path("board.dtb")?;
//! for compatible in dtb.compatible_strings() {
//!     println!("{}", compatible);
//! }
//! if let Some(path) = dtb.resolve_phandle(0x5) {
//!     println!("phandle 5 is {}", path);
//! }
//! # Ok::<(), dtb_parser::Error>(())
//! ```

use std::{fs, path::Path};

use log::debug;

pub use error::{Error, FdtError, Result};
pub use fdt::{Fdt, FdtNode, Header, MemoryReservation};
pub use phandle::PhandleIndex;
pub use tree::{join_path, node_name, unit_address, Node, NodeRecord, Properties};
pub use value::PropertyValue;

mod error;
pub mod fdt;
mod phandle;
mod tree;
mod value;

/// A decoded device tree blob.
///
/// All validation happens on construction; once built, every query is infallible.
#[derive(Debug, Clone)]
pub struct DtbParser {
    fdt: Fdt,
    phandles: PhandleIndex,
}

impl DtbParser {
    /// Read and decode the blob stored at `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("loading device tree blob from {}", path.display());

        let blob = fs::read(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_bytes(&blob)
    }

    /// Decode an in-memory blob.
    pub fn from_bytes(blob: &[u8]) -> Result<Self> {
        let fdt = Fdt::parse(blob)?;
        debug!(
            "decoded device tree blob version {}, {} bytes",
            fdt.header().version,
            fdt.header().total_size
        );

        let phandles = PhandleIndex::build(fdt.root());

        Ok(Self { fdt, phandles })
    }

    /// Build the node tree. Every call walks the blob again.
    pub fn root(&self) -> Node {
        tree::build_nodes(self.fdt.root())
    }

    /// Build the record tree. The result always holds exactly one record, the root.
    pub fn traverse(&self) -> Vec<NodeRecord> {
        vec![tree::build_records(self.fdt.root())]
    }

    /// Entries of the root node's `compatible` property, empty if there is none.
    pub fn compatible_strings(&self) -> Vec<String> {
        self.fdt
            .root()
            .property("compatible")
            .map(value::split_strings)
            .unwrap_or_default()
    }

    /// Path of the node declaring `phandle`.
    pub fn resolve_phandle(&self, phandle: u32) -> Option<&str> {
        self.phandles.resolve(phandle)
    }

    pub fn phandles(&self) -> &PhandleIndex {
        &self.phandles
    }

    pub fn header(&self) -> &Header {
        self.fdt.header()
    }

    pub fn memory_reservations(&self) -> &[MemoryReservation] {
        self.fdt.reservations()
    }

    /// The underlying decoded blob.
    pub fn fdt(&self) -> &Fdt {
        &self.fdt
    }
}

impl TryFrom<&[u8]> for DtbParser {
    type Error = Error;

    fn try_from(blob: &[u8]) -> Result<Self> {
        Self::from_bytes(blob)
    }
}
