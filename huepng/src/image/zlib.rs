use super::{Result, Error};
use log::trace;

const ZFAST_BITS: usize = 9;
const ZFAST_MASK: usize = (1 << ZFAST_BITS) - 1;
const ZNSYMS: usize = 288;
const ZDEFAULT_LENGTH: [u8; ZNSYMS] = [
   8,8,8,8,8,8,8,8,8,8,8,8,8,8,8,8, 8,8,8,8,8,8,8,8,8,8,8,8,8,8,8,8,
   8,8,8,8,8,8,8,8,8,8,8,8,8,8,8,8, 8,8,8,8,8,8,8,8,8,8,8,8,8,8,8,8,
   8,8,8,8,8,8,8,8,8,8,8,8,8,8,8,8, 8,8,8,8,8,8,8,8,8,8,8,8,8,8,8,8,
   8,8,8,8,8,8,8,8,8,8,8,8,8,8,8,8, 8,8,8,8,8,8,8,8,8,8,8,8,8,8,8,8,
   8,8,8,8,8,8,8,8,8,8,8,8,8,8,8,8, 9,9,9,9,9,9,9,9,9,9,9,9,9,9,9,9,
   9,9,9,9,9,9,9,9,9,9,9,9,9,9,9,9, 9,9,9,9,9,9,9,9,9,9,9,9,9,9,9,9,
   9,9,9,9,9,9,9,9,9,9,9,9,9,9,9,9, 9,9,9,9,9,9,9,9,9,9,9,9,9,9,9,9,
   9,9,9,9,9,9,9,9,9,9,9,9,9,9,9,9, 9,9,9,9,9,9,9,9,9,9,9,9,9,9,9,9,
   7,7,7,7,7,7,7,7,7,7,7,7,7,7,7,7, 7,7,7,7,7,7,7,7,8,8,8,8,8,8,8,8,
];
const ZDEFAULT_DISTANCE: [u8; 32] = [
   5,5,5,5,5,5,5,5,5,5,5,5,5,5,5,5,5,5,5,5,5,5,5,5,5,5,5,5,5,5,5,5
];
const ZLENGTH_BASE: [usize; 29] = [
    3,4,5,6,7,8,9,10,11,13,
    15,17,19,23,27,31,35,43,51,59,
    67,83,99,115,131,163,195,227,258,
];
const ZLENGTH_EXTRA: [u8; 29]= [
    0,0,0,0,0,0,0,0,1,1,1,1,2,2,2,2,3,3,3,3,4,4,4,4,5,5,5,5,0,
];
const ZDIST_BASE: [usize; 30] = [
    1,2,3,4,5,7,9,13,17,25,33,49,65,97,129,193,
    257,385,513,769,1025,1537,2049,3073,4097,6145,8193,12289,16385,24577,
];
const ZDIST_EXTRA: [u8; 30] = [
    0,0,0,0,1,1,2,2,3,3,4,4,5,5,6,6,7,7,8,8,9,9,10,10,11,11,12,12,13,13,
];

const MAX_STORED_BLOCK: usize = 65535;
const MIN_MATCH: usize = 3;
const MAX_MATCH: usize = 258;
const WINDOW_SIZE: usize = 1 << 15;
const HASH_BITS: u32 = 15;
const MAX_CHAIN: usize = 64;
const NIL: usize = usize::MAX;
const MAX_EXPANSION: usize = 1032;

/// How the scanline payload is packed on encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// stored blocks only
    Store,
    /// one fixed-Huffman block fed by a greedy LZ77 matcher
    Fast,
}

impl Default for Compression {
    fn default() -> Self {
        Compression::Fast
    }
}

pub fn adler32(data: &[u8]) -> u32 {
    const MOD_ADLER: u32 = 65_521;
    // largest n with 255*n*(n+1)/2 + (n+1)*(MOD_ADLER-1) <= u32::MAX
    const NMAX: usize = 5552;

    let (mut s1, mut s2) = (1u32, 0u32);
    for chunk in data.chunks(NMAX) {
        for &b in chunk {
            s1 += b as u32;
            s2 += s1;
        }
        s1 %= MOD_ADLER;
        s2 %= MOD_ADLER;
    }
    (s2 << 16) | s1
}

/// zlib-from-memory reader. The data chunks may split the stream anywhere, so
/// the caller concatenates every data payload into one buffer first.
struct Inflater<'r> {
    input: &'r [u8],
    // may run past input.len(): reads beyond the end yield zero bytes and
    // `overran` reports whether any of them were actually consumed
    pos: usize,

    num_bits: u8,
    code_buffer: u32,

    out: Vec<u8>,
    // hard cap on inflated bytes
    limit: usize,
}

impl<'r> Inflater<'r> {
    fn new(input: &'r [u8], limit: usize) -> Self {
        // deflate expands at most ~1032:1
        let capacity = limit.min(input.len().saturating_mul(MAX_EXPANSION));
        Self {
            input,
            pos: 0,
            num_bits: 0,
            code_buffer: 0,
            out: Vec::with_capacity(capacity),
            limit,
        }
    }

    fn expandable(&self, n: usize) -> Result<()> {
        if n > self.limit - self.out.len() {
            return Err(Error::malformed(format!("output buffer limit: inflating past {} bytes", self.limit)));
        }
        Ok(())
    }

    fn get8(&mut self) -> u8 {
        let b = self.input.get(self.pos).copied().unwrap_or(0);
        self.pos += 1;
        b
    }

    fn fill_bits(&mut self) {
        while self.num_bits <= 24 {
            debug_assert!(self.code_buffer < 1 << self.num_bits);
            self.code_buffer |= (self.get8() as u32) << self.num_bits;
            self.num_bits += 8;
        }
    }

    #[inline(always)]
    fn receive(&mut self, n: u8) -> u32 {
        debug_assert!(n < 32);
        if self.num_bits < n {
            self.fill_bits();
        }

        let k: u32 = self.code_buffer & ((1 << n) - 1);
        self.code_buffer >>= n;
        self.num_bits -= n;
        k
    }

    fn overran(&self) -> bool {
        self.pos * 8 - self.num_bits as usize > self.input.len() * 8
    }

    // next whole byte, first draining what is left in the bit buffer
    fn aligned_byte(&mut self) -> u8 {
        if self.num_bits >= 8 {
            let b = (self.code_buffer & 0xff) as u8;
            self.code_buffer >>= 8;
            self.num_bits -= 8;
            b
        } else {
            self.get8()
        }
    }

    fn align_to_byte(&mut self) {
        let rem = self.num_bits & 0b111;
        if rem > 0 {
            self.receive(rem);
        }
    }

    fn parse_header(&mut self) -> Result<()> {
        if self.input.len() < 2 { return Err(Error::malformed("zlib header: stream too short")); }
        let cmf = self.get8() as u32;
        let flg = self.get8() as u32;
        if (cmf * 256 + flg) % 31 != 0 { return Err(Error::malformed("zlib header: bad cmf/flg check")); }
        if flg & 32 > 0 { return Err(Error::malformed("zlib header: preset dictionary not allowed")); }
        if cmf & 15 != 8 { return Err(Error::malformed(format!("zlib header: compression method {}", cmf & 15))); }
        if cmf >> 4 > 7 { return Err(Error::malformed("zlib header: window larger than 32K")); }
        Ok(())
    }

    fn stored_block(&mut self) -> Result<()> {
        self.align_to_byte();

        let mut header = [0u8; 4];
        for b in header.iter_mut() {
            *b = self.aligned_byte();
        }
        debug_assert!(self.num_bits == 0);

        let len = u16::from_le_bytes([header[0], header[1]]) as usize;
        let nlen = u16::from_le_bytes([header[2], header[3]]) as usize;
        if nlen != len ^ 0xffff { return Err(Error::malformed("stored block: length check failed")); }
        if self.pos > self.input.len() || len > self.input.len() - self.pos {
            return Err(Error::malformed("stored block: reads past end of stream"));
        }
        self.expandable(len)?;
        self.out.extend_from_slice(&self.input[self.pos..self.pos + len]);
        self.pos += len;
        Ok(())
    }

    fn dynamic_tables(&mut self) -> Result<(Huffman, Huffman)> {
        const LENGTH_DEZIGZAG: [u8; 19] = [ 16,17,18,0,8,7,9,6,10,5,11,4,12,3,13,2,14,1,15 ];
        let mut z_codelength = Huffman::new();
        let mut lencodes: [u8; 286+32+137] = [0; 286+32+137]; // padding for maximum single op
        let mut codelength_sizes: [u8; 19] = [0; 19];

        let hlit = self.receive(5) as usize + 257;
        let hdist = self.receive(5) as usize + 1;
        let hclen = self.receive(4) as usize + 4;
        let ntot = hlit + hdist;

        for &slot in LENGTH_DEZIGZAG.iter().take(hclen) {
            codelength_sizes[slot as usize] = self.receive(3) as u8;
        }
        z_codelength.build(&codelength_sizes)?;

        let mut n = 0;
        while n < ntot {
            let c = z_codelength.decode(self).ok_or_else(|| Error::malformed("bad code lengths"))? as usize;
            if c < 16 {
                lencodes[n] = c as u8;
                n += 1;
                continue;
            }

            let (repeat, fill) = match c {
                16 => {
                    if n == 0 { return Err(Error::malformed("bad code lengths: repeat with no previous length")); }
                    (self.receive(2) as usize + 3, lencodes[n-1])
                },
                17 => (self.receive(3) as usize + 3, 0),
                18 => (self.receive(7) as usize + 11, 0),
                _ => return Err(Error::malformed("bad code lengths")),
            };
            if ntot - n < repeat {
                return Err(Error::malformed("bad code lengths: repeat overruns table"));
            }
            lencodes[n..n+repeat].iter_mut().for_each(|l| *l = fill);
            n += repeat;
        }

        let mut z_length = Huffman::new();
        let mut z_distance = Huffman::new();
        z_length.build(&lencodes[..hlit])?;
        z_distance.build(&lencodes[hlit..ntot])?;
        Ok((z_length, z_distance))
    }

    fn huffman_block(&mut self, z_length: &Huffman, z_distance: &Huffman) -> Result<()> {
        loop {
            if self.overran() { return Err(Error::malformed("compressed stream ends inside a block")); }
            let z = z_length.decode(self).ok_or_else(|| Error::malformed("bad huffman code"))? as usize;
            if z < 256 {
                self.expandable(1)?;
                self.out.push(z as u8);
                continue;
            }
            if z == 256 { return Ok(()); }

            let z = z - 257;
            if z >= ZLENGTH_BASE.len() { return Err(Error::malformed(format!("bad length symbol {}", z + 257))); }
            let mut len = ZLENGTH_BASE[z];
            if ZLENGTH_EXTRA[z] > 0 {
                len += self.receive(ZLENGTH_EXTRA[z]) as usize;
            }

            let z = z_distance.decode(self).ok_or_else(|| Error::malformed("bad huffman code"))? as usize;
            if z >= ZDIST_BASE.len() { return Err(Error::malformed(format!("bad distance symbol {}", z))); }
            let mut dist = ZDIST_BASE[z];
            if ZDIST_EXTRA[z] > 0 {
                dist += self.receive(ZDIST_EXTRA[z]) as usize;
            }
            if self.out.len() < dist { return Err(Error::malformed("distance reaches before start of output")); }
            self.expandable(len)?;

            // byte by byte: source and destination overlap when dist < len
            let mut p = self.out.len() - dist;
            for _ in 0..len {
                self.out.push(self.out[p]);
                p += 1;
            }
        }
    }

    fn inflate(&mut self) -> Result<()> {
        self.num_bits = 0;
        self.code_buffer = 0;
        loop {
            let is_final = self.receive(1) > 0;
            let btype = self.receive(2);
            trace!("deflate block type={} final={}", btype, is_final);
            match btype {
                0 => self.stored_block()?,
                1 => {
                    let mut z_length = Huffman::new();
                    let mut z_distance = Huffman::new();
                    z_length.build(&ZDEFAULT_LENGTH)?;
                    z_distance.build(&ZDEFAULT_DISTANCE)?;
                    self.huffman_block(&z_length, &z_distance)?;
                },
                2 => {
                    let (z_length, z_distance) = self.dynamic_tables()?;
                    self.huffman_block(&z_length, &z_distance)?;
                },
                _ => return Err(Error::malformed("invalid deflate block type 3")),
            }
            if self.overran() { return Err(Error::malformed("compressed stream truncated")); }
            if is_final { return Ok(()); }
        }
    }

    fn check_trailer(&mut self) -> Result<()> {
        self.align_to_byte();
        let mut trailer = [0u8; 4];
        for b in trailer.iter_mut() {
            *b = self.aligned_byte();
        }
        if self.overran() { return Err(Error::malformed("zlib trailer missing")); }

        let expected = u32::from_be_bytes(trailer);
        let actual = adler32(&self.out);
        if expected != actual {
            return Err(Error::malformed(format!("adler32 mismatch: stored {:08x}, computed {:08x}", expected, actual)));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Huffman {
    fast: [u16; 1 << ZFAST_BITS],
    first_code: [u16; 16],
    max_code: [u32; 17],
    first_symbol: [u16; 16],
    size: [u8; ZNSYMS],
    value: [u16; ZNSYMS],
}

impl Huffman {
    fn new() -> Self {
        Self {
            fast: [0; 1 << ZFAST_BITS],
            first_code: [0; 16],
            max_code: [0; 17],
            first_symbol: [0; 16],
            size: [0; ZNSYMS],
            value: [0; ZNSYMS],
        }
    }

    // canonical code construction from a list of code lengths
    fn build(&mut self, size_list: &[u8]) -> Result<()> {
        let mut sizes = [0u32; 17];
        self.fast.iter_mut().for_each(|f| *f = 0);
        for &s in size_list {
            sizes[s as usize] += 1;
        }
        sizes[0] = 0;
        for (idx, &count) in sizes.iter().enumerate().take(16).skip(1) {
            if count > (1 << idx) {
                return Err(Error::malformed("bad huffman code sizes"));
            }
        }

        let mut code = 0u32;
        let mut k = 0u32;
        let mut next_code = [0u32; 16];
        for idx in 1..16 {
            next_code[idx] = code;
            self.first_code[idx] = code as u16;
            self.first_symbol[idx] = k as u16;
            code += sizes[idx];
            if sizes[idx] > 0 && code - 1 >= (1 << idx) {
                return Err(Error::malformed("bad huffman code lengths"));
            }
            self.max_code[idx] = code << (16-idx); // preshift for inner loop
            code <<= 1;
            k += sizes[idx];
        }

        self.max_code[16] = 0x10000; // sentinel
        for (idx, &s) in size_list.iter().enumerate() {
            let s = s as usize;
            if s == 0 {
                continue;
            }
            let c = next_code[s] as usize - self.first_code[s] as usize + self.first_symbol[s] as usize;
            let fastv: u16 = ((s << 9) | idx) as u16;
            self.size[c] = s as u8;
            self.value[c] = idx as u16;

            if s <= ZFAST_BITS {
                let mut j = Self::bit_reverse(next_code[s], s) as usize;
                while j < (1 << ZFAST_BITS) {
                    self.fast[j] = fastv;
                    j += 1 << s;
                }
            }

            next_code[s] += 1;
        }

        Ok(())
    }

    fn bit_reverse(n: u32, bits: usize) -> u32 {
        debug_assert!(bits <= 16);
        (n as u16).reverse_bits() as u32 >> (16 - bits)
    }

    fn decode_slowpath(&self, zbuf: &mut Inflater) -> Option<u16> {
        // not resolved by the fast table; codes are stored MSB first so flip the buffer
        let k = Self::bit_reverse(zbuf.code_buffer, 16);
        let mut s = ZFAST_BITS;
        loop {
            s += 1;
            if k < self.max_code[s] { break; }
        }

        if s >= 16 { return None; }
        let b = (k >> (16-s)) as usize - self.first_code[s] as usize + self.first_symbol[s] as usize;
        if b >= ZNSYMS || (self.size[b] as usize) != s { return None; }
        zbuf.code_buffer >>= s;
        zbuf.num_bits -= s as u8;
        Some(self.value[b])
    }

    fn decode(&self, zbuf: &mut Inflater) -> Option<u16> {
        if zbuf.num_bits < 16 {
            zbuf.fill_bits();
        }
        let b = self.fast[(zbuf.code_buffer as usize) & ZFAST_MASK];
        if b > 0 {
            let s = (b >> 9) as usize;
            zbuf.code_buffer >>= s;
            zbuf.num_bits -= s as u8;
            return Some(b & 511)
        }

        self.decode_slowpath(zbuf)
    }
}

/// Inflate a zlib stream, failing once the output would grow past `limit` bytes.
pub fn decompress(data: &[u8], limit: usize, verify_adler: bool) -> Result<Vec<u8>> {
    let mut zbuf = Inflater::new(data, limit);
    zbuf.parse_header()?;
    zbuf.inflate()?;
    if verify_adler {
        zbuf.check_trailer()?;
    }
    Ok(zbuf.out)
}

/// LSB-first bit packer for the deflate side.
struct BitWriter {
    out: Vec<u8>,
    acc: u64,
    num_bits: u32,
}

impl BitWriter {
    fn with_capacity(capacity: usize) -> Self {
        Self { out: Vec::with_capacity(capacity), acc: 0, num_bits: 0 }
    }

    fn write_bits(&mut self, value: u32, n: u32) {
        debug_assert!(n <= 32);
        self.acc |= (value as u64) << self.num_bits;
        self.num_bits += n;
        while self.num_bits >= 8 {
            self.out.push(self.acc as u8);
            self.acc >>= 8;
            self.num_bits -= 8;
        }
    }

    // huffman codes go out most significant bit first
    fn write_code(&mut self, code: u32, len: u32) {
        self.write_bits(code.reverse_bits() >> (32 - len), len);
    }

    fn align(&mut self) {
        if self.num_bits > 0 {
            self.out.push(self.acc as u8);
            self.acc = 0;
            self.num_bits = 0;
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        debug_assert!(self.num_bits == 0);
        self.out.extend_from_slice(bytes);
    }

    fn finish(mut self) -> Vec<u8> {
        self.align();
        self.out
    }
}

fn fixed_literal_code(sym: usize) -> (u32, u32) {
    let sym = sym as u32;
    match sym {
        0..=143 => (0x30 + sym, 8),
        144..=255 => (0x190 + (sym - 144), 9),
        256..=279 => (sym - 256, 7),
        _ => (0xC0 + (sym - 280), 8),
    }
}

fn write_stored(data: &[u8], w: &mut BitWriter) {
    let mut start = 0;
    loop {
        let end = (start + MAX_STORED_BLOCK).min(data.len());
        let is_final = end == data.len();
        w.write_bits(is_final as u32, 1);
        w.write_bits(0, 2);
        w.align();

        let len = (end - start) as u16;
        w.write_bytes(&len.to_le_bytes());
        w.write_bytes(&(!len).to_le_bytes());
        w.write_bytes(&data[start..end]);

        if is_final { break; }
        start = end;
    }
}

struct MatchFinder {
    head: Vec<usize>,
    prev: Vec<usize>,
}

impl MatchFinder {
    fn new() -> Self {
        Self { head: vec![NIL; 1 << HASH_BITS], prev: vec![NIL; WINDOW_SIZE] }
    }

    fn hash(data: &[u8], i: usize) -> usize {
        let v = (data[i] as u32) << 16 | (data[i+1] as u32) << 8 | data[i+2] as u32;
        (v.wrapping_mul(0x9E37_79B1) >> (32 - HASH_BITS)) as usize
    }

    fn insert(&mut self, data: &[u8], i: usize) {
        if i + MIN_MATCH > data.len() { return; }
        let h = Self::hash(data, i);
        self.prev[i % WINDOW_SIZE] = self.head[h];
        self.head[h] = i;
    }

    // (length, distance) of the longest earlier match starting at i
    fn longest(&self, data: &[u8], i: usize) -> (usize, usize) {
        if i + MIN_MATCH > data.len() { return (0, 0); }
        let limit = MAX_MATCH.min(data.len() - i);
        let (mut best_len, mut best_dist) = (0, 0);
        let mut cand = self.head[Self::hash(data, i)];
        let mut chain = 0;

        while cand != NIL && cand < i && i - cand <= WINDOW_SIZE && chain < MAX_CHAIN {
            let len = data[cand..].iter().zip(&data[i..i + limit]).take_while(|(a, b)| a == b).count();
            if len > best_len {
                best_len = len;
                best_dist = i - cand;
                if len == limit { break; }
            }
            let next = self.prev[cand % WINDOW_SIZE];
            if next >= cand { break; }
            cand = next;
            chain += 1;
        }
        (best_len, best_dist)
    }
}

fn write_fixed(data: &[u8], w: &mut BitWriter) {
    w.write_bits(1, 1);
    w.write_bits(1, 2);

    let mut finder = MatchFinder::new();
    let mut i = 0;
    while i < data.len() {
        let (len, dist) = finder.longest(data, i);
        if len >= MIN_MATCH {
            let lidx = (0..ZLENGTH_BASE.len()).rev().find(|&k| ZLENGTH_BASE[k] <= len).unwrap_or(0);
            let (code, bits) = fixed_literal_code(257 + lidx);
            w.write_code(code, bits);
            w.write_bits((len - ZLENGTH_BASE[lidx]) as u32, ZLENGTH_EXTRA[lidx] as u32);

            let didx = (0..ZDIST_BASE.len()).rev().find(|&k| ZDIST_BASE[k] <= dist).unwrap_or(0);
            w.write_code(didx as u32, 5);
            w.write_bits((dist - ZDIST_BASE[didx]) as u32, ZDIST_EXTRA[didx] as u32);

            for j in i..i + len {
                finder.insert(data, j);
            }
            i += len;
        } else {
            let (code, bits) = fixed_literal_code(data[i] as usize);
            w.write_code(code, bits);
            finder.insert(data, i);
            i += 1;
        }
    }

    let (code, bits) = fixed_literal_code(256);
    w.write_code(code, bits);
}

/// Wrap `data` in a zlib stream.
pub fn compress(data: &[u8], level: Compression) -> Vec<u8> {
    let mut w = BitWriter::with_capacity(data.len() / 2 + 64);
    match level {
        Compression::Store => {
            w.write_bytes(&[0x78, 0x01]);
            write_stored(data, &mut w);
        },
        Compression::Fast => {
            w.write_bytes(&[0x78, 0x9c]);
            write_fixed(data, &mut w);
        },
    }
    w.align();
    w.write_bytes(&adler32(data).to_be_bytes());
    let out = w.finish();
    trace!("zlib {:?}: {} -> {} bytes", level, data.len(), out.len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ErrorKind;

    fn unhex(s: &str) -> Vec<u8> {
        (0..s.len()).step_by(2).map(|i| u8::from_str_radix(&s[i..i+2], 16).unwrap()).collect()
    }

    #[test]
    fn adler_known_values() {
        assert_eq!(adler32(&[]), 1);
        assert_eq!(adler32(b"hello"), 0x062C_0215);
        assert_eq!(adler32(b"123456789"), 0x091E_01DE);
    }

    #[test]
    fn inflates_fixed_huffman_stream() {
        let z = [120, 156, 203, 72, 205, 201, 201, 7, 0, 6, 44, 2, 21];
        assert_eq!(decompress(&z, usize::MAX, true).unwrap(), b"hello");
    }

    #[test]
    fn inflates_dynamic_huffman_stream() {
        let z = unhex(concat!(
            "78da2bc94855282ccd4cce56482aca2fcf5348cbaf50c82acd2d2856c82f4b2d5228014ae72456552aa4e4a7eb8179a3",
            "8a47158f2aa6aa6206462666165636760e4e2e6e1e5e3e7e0141216111513171094929691959397905452565155535750d",
            "4d2d6d1d5d3d7d03432363135333730b4b2b6b1b5b3b7b07472767175737770f4f2f6f1f5f3fff80c0a0e090d0b0f088c8",
            "a8e898d8b8f884c4a4e494d4b4f48cccacec9cdcbcfc82c2a2e292d2b2f28acaaaea9adabafa86c6a6e696d6b6f68eceaee",
            "e9edebefe0913274d9e3275daf4193367cd9e3377defc050b172d5eb274d9f2152b57ad5eb376ddfa0d1b376ddeb275dbf6",
            "1d3b77eddeb377dffe03070f1d3e72f4d8f113274f9d3e73f6dcf90b172f5dbe72f5daf51b376fddbe73f7defd070f1f3d7",
            "ef2f4d9f3172f5fbd7ef3f6ddfb0f1f3f7dfef2f5dbf71f3f7ffdfef3f7df7f003240c51c",
        ));
        let mut expected = b"the quick brown fox jumps over the lazy dog. ".repeat(20);
        expected.extend(0..=255u8);
        assert_eq!(decompress(&z, usize::MAX, true).unwrap(), expected);
    }

    #[test]
    fn stored_round_trip_spans_several_blocks() {
        let data: Vec<u8> = (0..150_000u32).map(|i| (i * 7 % 251) as u8).collect();
        let z = compress(&data, Compression::Store);
        assert_eq!(decompress(&z, data.len(), true).unwrap(), data);
    }

    #[test]
    fn fast_round_trip_with_long_runs() {
        let mut data = vec![0u8; 1000];
        data.extend((0..5000u32).map(|i| (i % 13) as u8));
        data.extend(b"abcabcabcabd".iter());
        let z = compress(&data, Compression::Fast);
        assert!(z.len() < data.len() / 4);
        assert_eq!(decompress(&z, usize::MAX, true).unwrap(), data);
    }

    #[test]
    fn empty_input_round_trips() {
        for level in [Compression::Store, Compression::Fast].iter() {
            let z = compress(&[], *level);
            assert_eq!(decompress(&z, usize::MAX, true).unwrap(), Vec::<u8>::new());
        }
    }

    #[test]
    fn adler_mismatch_is_rejected() {
        let mut z = compress(b"some scanline bytes", Compression::Fast);
        let n = z.len();
        z[n - 1] ^= 0xff;
        let err = decompress(&z, usize::MAX, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedContainer);
        assert!(decompress(&z, usize::MAX, false).is_ok());
    }

    #[test]
    fn truncated_stream_is_rejected() {
        let data: Vec<u8> = (0..4000u32).map(|i| (i * 31 % 256) as u8).collect();
        let z = compress(&data, Compression::Store);
        assert!(decompress(&z[..z.len() / 2], usize::MAX, false).is_err());
    }

    #[test]
    fn output_limit_is_enforced() {
        let data = vec![7u8; 100_000];
        for level in [Compression::Store, Compression::Fast].iter() {
            let z = compress(&data, *level);
            assert_eq!(decompress(&z, data.len(), true).unwrap(), data);
            let err = decompress(&z, data.len() - 1, true).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedContainer, "{:?}", level);
        }
    }

    #[test]
    fn bad_header_is_rejected() {
        assert!(decompress(&[0x78, 0x00, 0, 0], usize::MAX, true).is_err());
        assert!(decompress(&[0x79, 0x9c], usize::MAX, true).is_err());
    }
}
