use serde::Serialize;

/// A property value, typed by inspecting its raw bytes.
///
/// The blob format carries no type information, so the variant is a best guess: see
/// [`PropertyValue::decode`] for the rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Str(String),
    StrList(Vec<String>),
    Cell(u32),
    Cells(Vec<u32>),
    Bytes(Vec<u8>),
}

impl PropertyValue {
    /// Decode raw property bytes. Never fails.
    ///
    /// Rules are applied in order:
    ///
    /// 1. Bytes containing a NUL that are not all zero are strings. Empty segments are
    ///    dropped; one remaining segment gives [`Str`](Self::Str), any other count gives
    ///    [`StrList`](Self::StrList), possibly empty.
    /// 2. A non-empty length that is a multiple of 4 gives big-endian cells:
    ///    [`Cell`](Self::Cell) for exactly one, [`Cells`](Self::Cells) otherwise.
    /// 3. Anything else is kept as [`Bytes`](Self::Bytes).
    ///
    /// Rule 1 wins over rule 2, so `<0x1 0x2>` decodes as a list of control-character
    /// strings.
    pub fn decode(data: &[u8]) -> Self {
        if data.contains(&0) && data.iter().any(|&b| b != 0) {
            let mut strings = split_strings(data);

            if strings.len() == 1 {
                PropertyValue::Str(strings.remove(0))
            } else {
                PropertyValue::StrList(strings)
            }
        } else if !data.is_empty() && data.len() % 4 == 0 {
            let mut cells: Vec<u32> = data
                .chunks_exact(4)
                .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
                .collect();

            if cells.len() == 1 {
                PropertyValue::Cell(cells.remove(0))
            } else {
                PropertyValue::Cells(cells)
            }
        } else {
            PropertyValue::Bytes(data.to_vec())
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            PropertyValue::Cell(c) => Some(*c),
            _ => None,
        }
    }
}

impl From<&[u8]> for PropertyValue {
    fn from(data: &[u8]) -> Self {
        PropertyValue::decode(data)
    }
}

/// Split NUL-separated text, dropping empty segments and replacing invalid UTF-8.
pub(crate) fn split_strings(data: &[u8]) -> Vec<String> {
    data.split(|&b| b == 0)
        .filter(|s| !s.is_empty())
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .collect()
}
