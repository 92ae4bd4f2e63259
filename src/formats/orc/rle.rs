//! Run-length encodings of ORC streams
//!
//! Decoders take the number of values the stream must yield and fail when
//! the bytes run out first. Runs that overshoot the count are cut.

use super::corrupt;
use super::proto::{read_varint, write_varint};
use crate::error::Result;

const MIN_RUN: usize = 3;
const MAX_RUN: usize = 130;
const MAX_LITERALS: usize = 128;

fn next_byte(data: &[u8], pos: &mut usize) -> Result<u8> {
    let byte = *data.get(*pos).ok_or_else(|| corrupt("stream ended early"))?;
    *pos += 1;
    Ok(byte)
}

pub(super) fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

pub(super) fn zigzag_decode(value: u64) -> i64 {
    (value >> 1) as i64 ^ -((value & 1) as i64)
}

fn read_int(data: &[u8], pos: &mut usize, signed: bool) -> Result<i64> {
    let raw = read_varint(data, pos)?;
    Ok(if signed { zigzag_decode(raw) } else { raw as i64 })
}

// Byte RLE

pub(super) fn encode_bytes(values: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut literals: Vec<u8> = Vec::new();
    let flush = |out: &mut Vec<u8>, literals: &mut Vec<u8>| {
        if !literals.is_empty() {
            out.push((literals.len() as u8).wrapping_neg());
            out.append(literals);
        }
    };
    let mut i = 0;
    while i < values.len() {
        let run = values[i..]
            .iter()
            .take(MAX_RUN)
            .take_while(|v| **v == values[i])
            .count();
        if run >= MIN_RUN {
            flush(&mut out, &mut literals);
            out.push((run - MIN_RUN) as u8);
            out.push(values[i]);
            i += run;
        } else {
            literals.push(values[i]);
            if literals.len() == MAX_LITERALS {
                flush(&mut out, &mut literals);
            }
            i += 1;
        }
    }
    flush(&mut out, &mut literals);
    out
}

pub(super) fn decode_bytes(data: &[u8], count: usize) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut pos = 0;
    while out.len() < count {
        let control = next_byte(data, &mut pos)? as i8;
        if control >= 0 {
            let value = next_byte(data, &mut pos)?;
            out.extend(std::iter::repeat(value).take(control as usize + MIN_RUN));
        } else {
            for _ in 0..control.unsigned_abs() {
                out.push(next_byte(data, &mut pos)?);
            }
        }
    }
    out.truncate(count);
    Ok(out)
}

// Boolean RLE: bits packed most significant first, then byte RLE

pub(super) fn encode_bools(values: &[bool]) -> Vec<u8> {
    let packed: Vec<u8> = values
        .chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |acc, (i, b)| if *b { acc | (0x80 >> i) } else { acc })
        })
        .collect();
    encode_bytes(&packed)
}

pub(super) fn decode_bools(data: &[u8], count: usize) -> Result<Vec<bool>> {
    let packed = decode_bytes(data, count / 8 + usize::from(count % 8 != 0))?;
    Ok(packed
        .iter()
        .flat_map(|byte| (0..8).map(move |i| byte & (0x80 >> i) != 0))
        .take(count)
        .collect())
}

// Integer RLE, version 1

pub(super) fn encode_ints_v1(values: &[i64], signed: bool) -> Vec<u8> {
    let mut out = Vec::new();
    let mut literals: Vec<i64> = Vec::new();
    let write = |out: &mut Vec<u8>, v: i64| {
        write_varint(out, if signed { zigzag_encode(v) } else { v as u64 });
    };
    let flush = |out: &mut Vec<u8>, literals: &mut Vec<i64>| {
        if !literals.is_empty() {
            out.push((literals.len() as u8).wrapping_neg());
            for v in literals.drain(..) {
                write(out, v);
            }
        }
    };
    let mut i = 0;
    while i < values.len() {
        let delta = values
            .get(i + 1)
            .and_then(|next| next.checked_sub(values[i]))
            .and_then(|d| i8::try_from(d).ok());
        let run = match delta {
            Some(d) => {
                1 + values[i..]
                    .windows(2)
                    .take(MAX_RUN - 1)
                    .take_while(|w| w[1].checked_sub(w[0]) == Some(i64::from(d)))
                    .count()
            }
            None => 1,
        };
        if run >= MIN_RUN {
            flush(&mut out, &mut literals);
            out.push((run - MIN_RUN) as u8);
            out.push(delta.unwrap_or(0) as u8);
            write(&mut out, values[i]);
            i += run;
        } else {
            literals.push(values[i]);
            if literals.len() == MAX_LITERALS {
                flush(&mut out, &mut literals);
            }
            i += 1;
        }
    }
    flush(&mut out, &mut literals);
    out
}

pub(super) fn decode_ints_v1(data: &[u8], count: usize, signed: bool) -> Result<Vec<i64>> {
    let mut out = Vec::new();
    let mut pos = 0;
    while out.len() < count {
        let control = next_byte(data, &mut pos)? as i8;
        if control >= 0 {
            let delta = i64::from(next_byte(data, &mut pos)? as i8);
            let base = read_int(data, &mut pos, signed)?;
            let run = control as i64 + MIN_RUN as i64;
            out.extend((0..run).map(|k| base.wrapping_add(k.wrapping_mul(delta))));
        } else {
            for _ in 0..control.unsigned_abs() {
                out.push(read_int(data, &mut pos, signed)?);
            }
        }
    }
    out.truncate(count);
    Ok(out)
}

// Integer RLE, version 2 (decode only); tag 3 is DELTA

const SHORT_REPEAT: u8 = 0;
const DIRECT: u8 = 1;
const PATCHED_BASE: u8 = 2;

/// Bit width of a 5-bit width code
fn decode_width(code: u8) -> usize {
    match code {
        0..=23 => code as usize + 1,
        24 => 26,
        25 => 28,
        26 => 30,
        27 => 32,
        28 => 40,
        29 => 48,
        30 => 56,
        _ => 64,
    }
}

/// Smallest width of the width table that holds `bits`
fn closest_fixed_bits(bits: usize) -> usize {
    match bits {
        0 => 1,
        1..=24 => bits,
        25..=26 => 26,
        27..=28 => 28,
        29..=30 => 30,
        31..=32 => 32,
        33..=40 => 40,
        41..=48 => 48,
        49..=56 => 56,
        _ => 64,
    }
}

/// `count` big-endian bit-packed values of `width` bits, starting at a byte boundary
fn unpack(data: &[u8], pos: &mut usize, count: usize, width: usize) -> Result<Vec<u64>> {
    let nbytes = (count * width + 7) / 8;
    let end = pos
        .checked_add(nbytes)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| corrupt("bit-packed run ended early"))?;
    let slice = &data[*pos..end];
    *pos = end;

    let mut values = Vec::with_capacity(count);
    let mut bit = 0;
    for _ in 0..count {
        let mut value = 0u64;
        let mut remaining = width;
        while remaining > 0 {
            let offset = bit % 8;
            let available = 8 - offset;
            let n = available.min(remaining);
            let chunk = (slice[bit / 8] >> (available - n)) & (((1u16 << n) - 1) as u8);
            value = (value << n) | u64::from(chunk);
            bit += n;
            remaining -= n;
        }
        values.push(value);
    }
    Ok(values)
}

fn read_be(data: &[u8], pos: &mut usize, width: usize) -> Result<u64> {
    let mut value = 0u64;
    for _ in 0..width {
        value = (value << 8) | u64::from(next_byte(data, pos)?);
    }
    Ok(value)
}

pub(super) fn decode_ints_v2(data: &[u8], count: usize, signed: bool) -> Result<Vec<i64>> {
    let mut out = Vec::new();
    let mut pos = 0;
    let sign = |v: u64| if signed { zigzag_decode(v) } else { v as i64 };
    while out.len() < count {
        let header = next_byte(data, &mut pos)?;
        match header >> 6 {
            SHORT_REPEAT => {
                let width = ((header >> 3) & 0x07) as usize + 1;
                let repeat = (header & 0x07) as usize + MIN_RUN;
                let value = sign(read_be(data, &mut pos, width)?);
                out.extend(std::iter::repeat(value).take(repeat));
            }
            DIRECT => {
                let width = decode_width((header >> 1) & 0x1f);
                let len = run_length(header, data, &mut pos)?;
                out.extend(unpack(data, &mut pos, len, width)?.into_iter().map(sign));
            }
            PATCHED_BASE => {
                let width = decode_width((header >> 1) & 0x1f);
                let len = run_length(header, data, &mut pos)?;
                out.extend(patched_base(data, &mut pos, width, len)?);
            }
            _ => {
                let code = (header >> 1) & 0x1f;
                let width = if code == 0 { 0 } else { decode_width(code) };
                let len = run_length(header, data, &mut pos)?;
                let base = read_int(data, &mut pos, signed)?;
                let delta = read_int(data, &mut pos, true)?;
                out.push(base);
                if len > 1 {
                    let mut prev = base.wrapping_add(delta);
                    out.push(prev);
                    let rest = len - 2;
                    if width == 0 {
                        for _ in 0..rest {
                            prev = prev.wrapping_add(delta);
                            out.push(prev);
                        }
                    } else {
                        for step in unpack(data, &mut pos, rest, width)? {
                            let step = step as i64;
                            prev = if delta < 0 {
                                prev.wrapping_sub(step)
                            } else {
                                prev.wrapping_add(step)
                            };
                            out.push(prev);
                        }
                    }
                }
            }
        }
    }
    out.truncate(count);
    Ok(out)
}

/// Nine-bit run length stored across the header and the next byte
fn run_length(header: u8, data: &[u8], pos: &mut usize) -> Result<usize> {
    let low = next_byte(data, pos)?;
    Ok(((usize::from(header & 0x01) << 8) | usize::from(low)) + 1)
}

fn patched_base(data: &[u8], pos: &mut usize, width: usize, len: usize) -> Result<Vec<i64>> {
    let third = next_byte(data, pos)?;
    let fourth = next_byte(data, pos)?;
    let base_width = ((third >> 5) & 0x07) as usize + 1;
    let patch_width = decode_width(third & 0x1f);
    let gap_width = ((fourth >> 5) & 0x07) as usize + 1;
    let patch_count = (fourth & 0x1f) as usize;
    if width + patch_width > 64 {
        return Err(corrupt("patch wider than 64 bits"));
    }

    let raw_base = read_be(data, pos, base_width)?;
    let sign_bit = 1u64 << (base_width * 8 - 1);
    let base = if raw_base & sign_bit != 0 {
        -((raw_base & !sign_bit) as i64)
    } else {
        raw_base as i64
    };

    let mut values = unpack(data, pos, len, width)?;
    let patches = unpack(data, pos, patch_count, closest_fixed_bits(gap_width + patch_width))?;
    let patch_mask = if patch_width == 64 { u64::MAX } else { (1u64 << patch_width) - 1 };

    let mut index = 0usize;
    let mut patches = patches.into_iter();
    while let Some(entry) = patches.next() {
        let gap = (entry >> patch_width) as usize;
        let patch = entry & patch_mask;
        index = index.saturating_add(gap);
        if gap == 255 && patch == 0 {
            continue;
        }
        let slot = values
            .get_mut(index)
            .ok_or_else(|| corrupt("patch beyond the run"))?;
        *slot |= patch << width;
    }
    Ok(values
        .into_iter()
        .map(|v| base.wrapping_add(v as i64))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_runs() {
        assert_eq!(decode_bytes(&[0x61, 0x00], 100).unwrap(), vec![0u8; 100]);
        assert_eq!(decode_bytes(&[0xfe, 0x44, 0x45], 2).unwrap(), vec![0x44, 0x45]);
        assert!(decode_bytes(&[0xfe, 0x44], 2).is_err());

        let values: Vec<u8> = [vec![7u8; 200], (0..150).collect(), vec![1, 1]].concat();
        let encoded = encode_bytes(&values);
        assert!(encoded.len() < values.len());
        assert_eq!(decode_bytes(&encoded, values.len()).unwrap(), values);
    }

    #[test]
    fn test_bool_bits() {
        let values = [true, false, false, true, true, true, true, true, false, true];
        let encoded = encode_bools(&values);
        assert_eq!(encoded, vec![0xfe, 0b1001_1111, 0b0100_0000]);
        assert_eq!(decode_bools(&encoded, values.len()).unwrap(), values);
    }

    #[test]
    fn test_int_v1_runs() {
        assert_eq!(decode_ints_v1(&[0x61, 0x00, 0x07], 100, false).unwrap(), vec![7; 100]);
        assert_eq!(
            decode_ints_v1(&[0xfb, 0x02, 0x03, 0x06, 0x07, 0x0b], 5, false).unwrap(),
            vec![2, 3, 6, 7, 11]
        );

        let values: Vec<i64> = (0..300)
            .map(|i| if i < 200 { 10 - i } else { i * i - 40_000 })
            .chain([i64::MIN, i64::MAX, 0])
            .collect();
        let encoded = encode_ints_v1(&values, true);
        assert_eq!(decode_ints_v1(&encoded, values.len(), true).unwrap(), values);
    }

    #[test]
    fn test_int_v2_short_repeat() {
        assert_eq!(decode_ints_v2(&[0x0a, 0x27, 0x10], 5, false).unwrap(), vec![10000; 5]);
    }

    #[test]
    fn test_int_v2_direct() {
        let data = [0x5e, 0x03, 0x5c, 0xa1, 0xab, 0x1e, 0xde, 0xad, 0xbe, 0xef];
        assert_eq!(
            decode_ints_v2(&data, 4, false).unwrap(),
            vec![23713, 43806, 57005, 48879]
        );
    }

    #[test]
    fn test_int_v2_patched_base() {
        let data = [
            0x8e, 0x13, 0x2b, 0x21, 0x07, 0xd0, 0x1e, 0x00, 0x14, 0x70, 0x28, 0x32, 0x3c, 0x46,
            0x50, 0x5a, 0x64, 0x6e, 0x78, 0x82, 0x8c, 0x96, 0xa0, 0xaa, 0xb4, 0xbe, 0xfc, 0xe8,
        ];
        let mut expected = vec![2030, 2000, 2020, 1_000_000];
        expected.extend((2040..=2190).step_by(10));
        assert_eq!(decode_ints_v2(&data, 20, false).unwrap(), expected);
    }

    #[test]
    fn test_int_v2_delta() {
        let data = [0xc6, 0x09, 0x02, 0x02, 0x22, 0x42, 0x42, 0x46];
        assert_eq!(
            decode_ints_v2(&data, 10, false).unwrap(),
            vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]
        );
    }

    #[test]
    fn test_truncated_runs_fail() {
        assert!(decode_ints_v2(&[0x5e, 0x03, 0x5c], 4, false).is_err());
        assert!(decode_ints_v1(&[0x61, 0x00], 100, false).is_err());
        assert!(decode_ints_v2(&[], 1, true).is_err());
        assert!(decode_ints_v2(&[], 0, true).unwrap().is_empty());
    }
}
