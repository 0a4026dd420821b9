//! SPDY name/value header blocks.
//!
//! A header block is an ordered set of name/value byte-string pairs. On the
//! wire it is a u32 pair count followed by, per pair, a u32 name length +
//! name bytes + u32 value length + value bytes, all big-endian. Names must
//! be non-empty, unique, and appear in lexicographic order -- the peers
//! share one compression window, so logically-equal blocks have to
//! serialize to identical bytes.

use std::collections::BTreeMap;

use crate::error::FramingError;

/// An ordered collection of header name/value pairs.
///
/// Backed by a `BTreeMap`, so iteration (and therefore serialization) is
/// always in canonical lexicographic order regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderBlock {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl HeaderBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, replacing and returning any previous value for the
    /// same name.
    pub fn insert(
        &mut self,
        name: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
    ) -> Option<Vec<u8>> {
        self.entries.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &[u8]) -> Option<&[u8]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate pairs in canonical (lexicographic) order.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.entries
            .iter()
            .map(|(n, v)| (n.as_slice(), v.as_slice()))
    }

    /// Serialize the (uncompressed) name/value wire encoding into `buf`.
    pub(crate) fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());
        for (name, value) in &self.entries {
            buf.extend_from_slice(&(name.len() as u32).to_be_bytes());
            buf.extend_from_slice(name);
            buf.extend_from_slice(&(value.len() as u32).to_be_bytes());
            buf.extend_from_slice(value);
        }
    }

    /// Decode an (already decompressed) name/value wire encoding.
    ///
    /// Rejects truncated input, trailing bytes, empty names, and names that
    /// are duplicated or out of lexicographic order.
    pub(crate) fn decode(buf: &[u8]) -> Result<Self, FramingError> {
        let count = read_u32(buf, 0)? as usize;
        let mut offset = 4;
        let mut entries = BTreeMap::new();
        let mut prev_name: Option<Vec<u8>> = None;

        for _ in 0..count {
            let name = read_chunk(buf, &mut offset)?;
            if name.is_empty() {
                return Err(FramingError::InvalidControlFrame);
            }
            if let Some(prev) = &prev_name {
                // Equal names are duplicates, descending names are
                // out of canonical order. Both are hard errors.
                if name <= *prev {
                    return Err(FramingError::InvalidControlFrame);
                }
            }
            let value = read_chunk(buf, &mut offset)?;
            prev_name = Some(name.clone());
            entries.insert(name, value);
        }

        if offset != buf.len() {
            return Err(FramingError::InvalidControlFrame);
        }
        Ok(Self { entries })
    }
}

impl<N: Into<Vec<u8>>, V: Into<Vec<u8>>> FromIterator<(N, V)> for HeaderBlock {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut block = Self::new();
        for (name, value) in iter {
            block.insert(name, value);
        }
        block
    }
}

fn read_u32(buf: &[u8], offset: usize) -> Result<u32, FramingError> {
    let end = offset.checked_add(4).ok_or(FramingError::InvalidControlFrame)?;
    let bytes = buf
        .get(offset..end)
        .ok_or(FramingError::InvalidControlFrame)?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_chunk(buf: &[u8], offset: &mut usize) -> Result<Vec<u8>, FramingError> {
    let len = read_u32(buf, *offset)? as usize;
    let start = *offset + 4;
    let end = start
        .checked_add(len)
        .ok_or(FramingError::InvalidControlFrame)?;
    let bytes = buf
        .get(start..end)
        .ok_or(FramingError::InvalidControlFrame)?;
    *offset = end;
    Ok(bytes.to_vec())
}
