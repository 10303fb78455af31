use super::{Result, Error};
use super::crc::{crc32, Crc32};
use log::trace;
use std::fmt;

pub const SIGNATURE: [u8; 8] = [ 137,80,78,71,13,10,26,10 ];

/// Four-byte chunk tag.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkType(pub [u8; 4]);

impl ChunkType {
    pub const IHDR: ChunkType = ChunkType(*b"IHDR");
    pub const PLTE: ChunkType = ChunkType(*b"PLTE");
    pub const TRNS: ChunkType = ChunkType(*b"tRNS");
    pub const IDAT: ChunkType = ChunkType(*b"IDAT");
    pub const IEND: ChunkType = ChunkType(*b"IEND");

    /// Lowercase first letter marks a chunk a decoder may skip.
    pub fn is_ancillary(&self) -> bool {
        self.0[0] & 0x20 != 0
    }
}

impl fmt::Debug for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag: String = self.0.iter().map(|&c| c as char).collect();
        write!(f, "{}", tag)
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub kind: ChunkType,
    pub data: &'a [u8],
    /// position of the length field in the container
    pub offset: usize,
}

/// Walks the chunk sequence after the signature, up to and including the end
/// marker. Each item borrows its payload from the input.
pub struct ChunkReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    verify_crc: bool,
    done: bool,
}

impl<'a> ChunkReader<'a> {
    pub fn new(bytes: &'a [u8], verify_crc: bool) -> Result<Self> {
        if bytes.len() < SIGNATURE.len() || bytes[..SIGNATURE.len()] != SIGNATURE {
            return Err(Error::malformed("bad signature").at(0));
        }
        Ok(Self { bytes, pos: SIGNATURE.len(), verify_crc, done: false })
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> usize {
        self.pos
    }

    fn read_u32_be(&self, at: usize) -> u32 {
        u32::from_be_bytes([self.bytes[at], self.bytes[at+1], self.bytes[at+2], self.bytes[at+3]])
    }

    fn next_chunk(&mut self) -> Result<Chunk<'a>> {
        let start = self.pos;
        let remaining = self.bytes.len() - start;
        if remaining < 12 {
            return Err(Error::malformed(format!("truncated chunk header: {} bytes left", remaining)).at(start));
        }

        let length = self.read_u32_be(start) as usize;
        let kind = ChunkType([self.bytes[start+4], self.bytes[start+5], self.bytes[start+6], self.bytes[start+7]]);
        if length > remaining - 12 {
            return Err(Error::malformed(format!("{} chunk declares {} bytes, only {} remain", kind, length, remaining - 12)).at(start));
        }

        let data = &self.bytes[start+8..start+8+length];
        let stored = self.read_u32_be(start + 8 + length);
        if self.verify_crc {
            let actual = crc32(&[&kind.0, data]);
            if actual != stored {
                return Err(Error::malformed(format!("{} crc mismatch: stored {:08x}, computed {:08x}", kind, stored, actual)).at(start));
            }
        }

        trace!("chunk {}@{} len={}", kind, start, length);
        self.pos = start + 12 + length;
        Ok(Chunk { kind, data, offset: start })
    }
}

impl<'a> Iterator for ChunkReader<'a> {
    type Item = Result<Chunk<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let r = self.next_chunk();
        match &r {
            Ok(chunk) => self.done = chunk.kind == ChunkType::IEND,
            Err(_) => self.done = true,
        }
        Some(r)
    }
}

/// Collect every chunk, failing if the sequence does not end with the end marker.
pub fn read_chunks(bytes: &[u8], verify_crc: bool) -> Result<Vec<Chunk<'_>>> {
    let chunks = ChunkReader::new(bytes, verify_crc)?.collect::<Result<Vec<_>>>()?;
    match chunks.last() {
        Some(c) if c.kind == ChunkType::IEND => Ok(chunks),
        _ => Err(Error::malformed("missing IEND").at(bytes.len())),
    }
}

/// Emits the signature followed by length/type/payload/crc records.
pub struct ChunkWriter {
    out: Vec<u8>,
}

impl ChunkWriter {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut out = Vec::with_capacity(capacity + SIGNATURE.len());
        out.extend_from_slice(&SIGNATURE);
        Self { out }
    }

    pub fn write_chunk(&mut self, kind: ChunkType, data: &[u8]) -> Result<()> {
        if data.len() > i32::MAX as usize {
            return Err(Error::too_large(format!("{} payload of {} bytes exceeds 2^31-1", kind, data.len())));
        }
        let mut crc = Crc32::new();
        crc.update(&kind.0);
        crc.update(data);

        self.out.reserve(12 + data.len());
        self.out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        self.out.extend_from_slice(&kind.0);
        self.out.extend_from_slice(data);
        self.out.extend_from_slice(&crc.finish().to_be_bytes());
        trace!("wrote chunk {} len={}", kind, data.len());
        Ok(())
    }

    pub fn finish(self) -> Vec<u8> {
        self.out
    }
}

impl Default for ChunkWriter {
    fn default() -> Self {
        Self::new()
    }
}
