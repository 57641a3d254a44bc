use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors that prevent a [`DtbParser`](crate::DtbParser) from being constructed.
#[derive(Debug, Error)]
pub enum Error {
    /// The blob could not be read from storage
    #[error("failed to read device tree blob from {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The blob is not a well-formed flattened device tree
    #[error("malformed device tree blob")]
    Format(#[from] FdtError),
}

/// Structural problems found while decoding a blob.
///
/// Offsets in the structure-related variants are relative to the start of the
/// structure block; string offsets are relative to the start of the strings block.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FdtError {
    #[error("blob is too small: need {0} bytes, got {1}")]
    Truncated(usize, usize),
    #[error("invalid magic number {0:#x}")]
    BadMagic(u32),
    #[error("unsupported blob version {0} (last compatible version {1})")]
    UnsupportedVersion(u32, u32),
    #[error("{block} block {start:#x}..{end:#x} exceeds the blob size {total_size:#x}")]
    BlockOutOfBounds {
        block: &'static str,
        start: usize,
        end: usize,
        total_size: usize,
    },
    #[error("memory reservation block is not terminated")]
    BadReservationBlock,
    #[error("invalid or truncated token at offset {0:#x}")]
    BadToken(usize),
    #[error("invalid structure at offset {0:#x}: {1}")]
    BadStructure(usize, &'static str),
    #[error("node at offset {0:#x} is nested deeper than {1} levels")]
    TooDeep(usize, usize),
    #[error("name at offset {0:#x} is not valid UTF-8")]
    BadName(usize),
    #[error("no terminated string at offset {0:#x} of the strings block")]
    BadString(usize),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
