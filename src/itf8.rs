// decram: Decode CRAM alignment containers to SAM.
//
// Copyright 2025 Tommi Mäklin [tommi@maklin.fi].
//
// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.
//
// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//
use crate::DecodeError;

use std::io::Read;

/// Reads one byte, mapping EOF to [DecodeError::TruncatedStream].
pub fn read_u8<R: Read>(
    conn: &mut R,
) -> Result<u8, DecodeError> {
    let mut buf = [0_u8; 1];
    conn.read_exact(&mut buf)
        .map_err(|_| DecodeError::TruncatedStream("unexpected end of stream".to_string()))?;
    Ok(buf[0])
}

/// Reads an unsigned ITF8 integer (1 to 5 bytes).
///
/// The number of leading ones in the first byte selects the length; the
/// fifth byte, when present, contributes only its low nibble.
///
pub fn read_itf8<R: Read>(
    conn: &mut R,
) -> Result<i32, DecodeError> {
    let first = read_u8(conn)?;
    read_itf8_from_first_byte(first, conn)
}

/// Continues an ITF8 read after the first byte has already been consumed.
pub fn read_itf8_from_first_byte<R: Read>(
    first: u8,
    conn: &mut R,
) -> Result<i32, DecodeError> {
    if first & 0x80 == 0 {
        return Ok(first as i32);
    }
    if first & 0x40 == 0 {
        let b1 = read_u8(conn)? as u32;
        return Ok(((((first & 0x7f) as u32) << 8) | b1) as i32);
    }
    if first & 0x20 == 0 {
        let b1 = read_u8(conn)? as u32;
        let b2 = read_u8(conn)? as u32;
        return Ok(((((first & 0x3f) as u32) << 16) | (b1 << 8) | b2) as i32);
    }
    if first & 0x10 == 0 {
        let b1 = read_u8(conn)? as u32;
        let b2 = read_u8(conn)? as u32;
        let b3 = read_u8(conn)? as u32;
        return Ok(((((first & 0x1f) as u32) << 24) | (b1 << 16) | (b2 << 8) | b3) as i32);
    }

    let b1 = read_u8(conn)? as u32;
    let b2 = read_u8(conn)? as u32;
    let b3 = read_u8(conn)? as u32;
    let b4 = read_u8(conn)? as u32;
    if b4 & 0xf0 != 0 {
        return Err(DecodeError::MalformedStream("ITF8 overflow".to_string()));
    }
    Ok(((((first & 0x0f) as u32) << 28) | (b1 << 20) | (b2 << 12) | (b3 << 4) | b4) as i32)
}

/// Appends `value` as unsigned ITF8.
pub fn write_itf8(
    value: i32,
    out: &mut Vec<u8>,
) {
    let v = value as u32;
    if v < 0x80 {
        out.push(v as u8);
    } else if v < 0x4000 {
        out.push(((v >> 8) | 0x80) as u8);
        out.push(v as u8);
    } else if v < 0x0020_0000 {
        out.push(((v >> 16) | 0xc0) as u8);
        out.push((v >> 8) as u8);
        out.push(v as u8);
    } else if v < 0x1000_0000 {
        out.push(((v >> 24) | 0xe0) as u8);
        out.push((v >> 16) as u8);
        out.push((v >> 8) as u8);
        out.push(v as u8);
    } else {
        out.push(((v >> 28) | 0xf0) as u8);
        out.push((v >> 20) as u8);
        out.push((v >> 12) as u8);
        out.push((v >> 4) as u8);
        out.push((v & 0x0f) as u8);
    }
}

/// Reads an unsigned LTF8 integer (1 to 9 bytes), the 64-bit analogue of
/// ITF8 used for record counters and base counts.
pub fn read_ltf8<R: Read>(
    conn: &mut R,
) -> Result<i64, DecodeError> {
    let first = read_u8(conn)?;
    let ones = first.leading_ones();
    if ones == 0 {
        return Ok(first as i64);
    }

    let mut value: u64 = if ones >= 7 {
        0
    } else {
        (first & (0xff_u8 >> (ones + 1))) as u64
    };
    for _ in 0..ones {
        value = (value << 8) | read_u8(conn)? as u64;
    }
    Ok(value as i64)
}

/// Appends `value` as unsigned LTF8.
pub fn write_ltf8(
    value: i64,
    out: &mut Vec<u8>,
) {
    let v = value as u64;
    // Number of payload bytes after the first: smallest n with the value
    // fitting in (7 - n) + 8 * n = 7 * (n + 1) significant bits, capped at 8.
    let mut extra: u32 = 0;
    while extra < 8 && (v >> (7 * (extra + 1))) != 0 {
        extra += 1;
    }

    if extra == 0 {
        out.push(v as u8);
        return;
    }
    if extra >= 7 {
        out.push(if extra == 8 { 0xff } else { 0xfe });
    } else {
        let prefix: u8 = !(0xff_u8 >> extra);
        out.push(prefix | ((v >> (8 * extra)) as u8));
    }
    for i in (0..extra).rev() {
        out.push((v >> (8 * i)) as u8);
    }
}
