//! Per-row prediction filters.
//!
//! Decoding keeps one explicit accumulator, the previous *reconstructed* row,
//! and hands it from row to row. Up, Average and Paeth read that buffer,
//! never the still-filtered bytes from the stream.

use super::{Result, Error};
use log::{debug, trace};
use std::convert::TryFrom;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FilterType {
    None    = 0,
    Sub     = 1,
    Up      = 2,
    Average = 3,
    Paeth   = 4,
}

impl FilterType {
    pub const ALL: [FilterType; 5] = [
        FilterType::None,
        FilterType::Sub,
        FilterType::Up,
        FilterType::Average,
        FilterType::Paeth,
    ];
}

impl TryFrom<u8> for FilterType {
    type Error = Error;

    fn try_from(tag: u8) -> Result<Self> {
        FilterType::ALL
            .get(tag as usize)
            .copied()
            .ok_or_else(|| Error::malformed(format!("invalid filter type {}", tag)))
    }
}

/// How the encoder picks a filter for each row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStrategy {
    Fixed(FilterType),
    /// smallest sum of absolute residuals, per row
    Adaptive,
}

impl Default for FilterStrategy {
    fn default() -> Self {
        FilterStrategy::Adaptive
    }
}

/// Predictor picking whichever neighbour is closest to `a + b - c`;
/// ties go to `a` (left), then `b` (up), then `c` (up-left).
pub fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let (ia, ib, ic) = (a as i16, b as i16, c as i16);
    let p = ia + ib - ic;
    let pa = (p - ia).abs();
    let pb = (p - ib).abs();
    let pc = (p - ic).abs();
    if pa <= pb && pa <= pc { return a; }
    if pb <= pc { return b; }
    c
}

/// Undo `filter` in place. `prev` is the previous reconstructed row (all
/// zeros for the first row); `bpp` is the distance back to the same channel
/// of the left pixel.
pub fn unfilter_row(filter: FilterType, bpp: usize, prev: &[u8], cur: &mut [u8]) {
    debug_assert_eq!(prev.len(), cur.len());
    let first = bpp.min(cur.len());
    match filter {
        FilterType::None => {},
        FilterType::Sub => {
            for i in bpp..cur.len() {
                cur[i] = cur[i].wrapping_add(cur[i-bpp]);
            }
        },
        FilterType::Up => {
            for (c, &up) in cur.iter_mut().zip(prev) {
                *c = c.wrapping_add(up);
            }
        },
        FilterType::Average => {
            for i in 0..first {
                cur[i] = cur[i].wrapping_add(prev[i] >> 1);
            }
            for i in first..cur.len() {
                let avg = ((cur[i-bpp] as u16 + prev[i] as u16) >> 1) as u8;
                cur[i] = cur[i].wrapping_add(avg);
            }
        },
        FilterType::Paeth => {
            for i in 0..first {
                cur[i] = cur[i].wrapping_add(paeth(0, prev[i], 0));
            }
            for i in first..cur.len() {
                cur[i] = cur[i].wrapping_add(paeth(cur[i-bpp], prev[i], prev[i-bpp]));
            }
        },
    }
}

/// Append `filter` applied to the raw row `cur` onto `out` (without the tag).
pub fn filter_row(filter: FilterType, bpp: usize, prev: &[u8], cur: &[u8], out: &mut Vec<u8>) {
    debug_assert_eq!(prev.len(), cur.len());
    let left = |i: usize| if i >= bpp { cur[i-bpp] } else { 0 };
    let up_left = |i: usize| if i >= bpp { prev[i-bpp] } else { 0 };
    match filter {
        FilterType::None => out.extend_from_slice(cur),
        FilterType::Sub => out.extend((0..cur.len()).map(|i| cur[i].wrapping_sub(left(i)))),
        FilterType::Up => out.extend(cur.iter().zip(prev).map(|(&c, &u)| c.wrapping_sub(u))),
        FilterType::Average => out.extend((0..cur.len()).map(|i| {
            cur[i].wrapping_sub(((left(i) as u16 + prev[i] as u16) >> 1) as u8)
        })),
        FilterType::Paeth => out.extend((0..cur.len()).map(|i| {
            cur[i].wrapping_sub(paeth(left(i), prev[i], up_left(i)))
        })),
    }
}

// residual bytes read as signed, the usual heuristic for "compresses well"
fn score(filtered: &[u8]) -> u64 {
    filtered.iter().map(|&b| (b as i8).unsigned_abs() as u64).sum()
}

/// Filter one row per `strategy`, appending the tag byte and the filtered bytes.
pub fn encode_row(strategy: FilterStrategy, bpp: usize, prev: &[u8], cur: &[u8], out: &mut Vec<u8>, scratch: &mut Vec<u8>) -> FilterType {
    let filter = match strategy {
        FilterStrategy::Fixed(filter) => filter,
        FilterStrategy::Adaptive => {
            let mut best = (FilterType::None, u64::MAX);
            for &candidate in FilterType::ALL.iter() {
                scratch.clear();
                filter_row(candidate, bpp, prev, cur, scratch);
                let s = score(scratch);
                if s < best.1 {
                    best = (candidate, s);
                }
            }
            best.0
        },
    };
    out.push(filter as u8);
    filter_row(filter, bpp, prev, cur, out);
    filter
}

/// Reconstruct `height` rows of `stride` bytes from the decompressed payload,
/// handing each finished row to `emit`. Trailing bytes past the last row are
/// ignored.
pub fn decode_rows<F>(data: &[u8], stride: usize, height: usize, bpp: usize, mut emit: F) -> Result<()>
where
    F: FnMut(usize, &[u8]) -> Result<()>,
{
    let line = stride + 1;
    let needed = line.checked_mul(height).ok_or_else(|| Error::too_large("scanline payload overflows"))?;
    if data.len() < needed {
        return Err(Error::truncated(format!(
            "decompressed payload is {} bytes, {} rows of {} need {}", data.len(), height, line, needed
        )).at(data.len()));
    }
    if data.len() > needed {
        debug!("ignoring {} bytes after the last scanline", data.len() - needed);
    }

    let mut prev = vec![0u8; stride];
    let mut cur = vec![0u8; stride];
    for (y, scanline) in data[..needed].chunks_exact(line).enumerate() {
        let filter = FilterType::try_from(scanline[0]).map_err(|e| e.at(y * line))?;
        trace!("row {} filter {:?}", y, filter);
        cur.copy_from_slice(&scanline[1..]);
        unfilter_row(filter, bpp, &prev, &mut cur);
        emit(y, &cur)?;
        std::mem::swap(&mut prev, &mut cur);
    }
    Ok(())
}
