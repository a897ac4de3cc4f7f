//! C2 — token scanning, number decoding, and three-byte name comparison.

use crate::arena::Du;

/// Bytes treated as token-separating whitespace (§6 Token syntax).
#[must_use]
pub fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

/// Find the next whitespace-delimited token in `buf` starting at `pos`,
/// advancing `pos` to just past it. Returns `None` once the buffer is
/// exhausted.
pub fn next_token(buf: &[u8], pos: &mut usize) -> Option<(usize, usize)> {
    let len = buf.len();
    while *pos < len && is_space(buf[*pos]) {
        *pos += 1;
    }
    if *pos >= len {
        return None;
    }
    let start = *pos;
    while *pos < len && !is_space(buf[*pos]) {
        *pos += 1;
    }
    Some((start, *pos))
}

/// Pad (or truncate) a token to the fixed three-byte name field width,
/// right-padding with ASCII space (§3, §4.2).
#[must_use]
pub fn pad3(tok: &[u8]) -> [u8; 3] {
    let mut out = [b' '; 3];
    for (slot, &b) in out.iter_mut().zip(tok.iter()) {
        *slot = b;
    }
    out
}

fn fold(b: u8, case_sensitive: bool) -> u8 {
    if case_sensitive {
        b
    } else {
        b.to_ascii_uppercase()
    }
}

/// Compare two padded three-byte names, honoring the case-sensitivity flag.
#[must_use]
pub fn name_eq(a: [u8; 3], b: [u8; 3], case_sensitive: bool) -> bool {
    a.iter()
        .zip(b.iter())
        .all(|(&x, &y)| fold(x, case_sensitive) == fold(y, case_sensitive))
}

/// Parse a token as a signed number literal per the current radix.
///
/// Accepts an optional leading `-`; decimal digits in decimal mode,
/// `0-9a-fA-F` in hex mode (§6 Token syntax). Returns `None` if the token
/// is empty or contains a character outside the current radix's digit set.
#[must_use]
pub fn parse_number(tok: &[u8], hex: bool) -> Option<Du> {
    if tok.is_empty() {
        return None;
    }
    let (neg, digits) = match tok[0] {
        b'-' => (true, &tok[1..]),
        _ => (false, tok),
    };
    if digits.is_empty() {
        return None;
    }
    let radix: u32 = if hex { 16 } else { 10 };
    let mut value: i32 = 0;
    for &b in digits {
        let digit = (b as char).to_digit(radix)?;
        value = value.wrapping_mul(radix as i32).wrapping_add(digit as i32);
    }
    let value = if neg { -value } else { value };
    Some(value as Du)
}
