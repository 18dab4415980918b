//! Big-endian integer helpers and the fixed-width ASCII-double field codec
//! shared by every wire format in spec.md §3 (`LivePacket`, `NeighborReport`,
//! and the SDN frame's position deltas).

use crate::error::WireError;

/// Reads a big-endian `u32` from `buf[offset..offset+4]`.
pub fn read_u32(buf: &[u8], offset: usize) -> Result<u32, WireError> {
    let bytes: [u8; 4] = buf
        .get(offset..offset + 4)
        .ok_or(WireError::MalformedPacket { reason: "buffer too short for u32" })?
        .try_into()
        .expect("slice of length 4");
    Ok(u32::from_be_bytes(bytes))
}

/// Writes `value` as big-endian into `buf[offset..offset+4]`.
pub fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

/// Encodes `value` as a zero-padded ASCII decimal string in a field of
/// exactly `width` bytes, matching the source's `std::to_string(double)`
/// + zero-pad convention for `posX`/`posY` (spec.md §3, §9). C++'s
/// `std::to_string(double)` renders with a fixed six digits after the
/// decimal point (as if by `%f`), not Rust's shortest round-trip
/// `f64::to_string` — the SDN controller this wire format interops with
/// expects that fixed-precision rendering, so we format with `{:.6}` to
/// match it exactly. Truncates from the left if the rendered decimal is
/// longer than `width` (should not happen for realistic coordinate
/// magnitudes, but keeps `serialize` infallible).
pub fn encode_ascii_double(value: f64, width: usize) -> Vec<u8> {
    let rendered = format!("{value:.6}");
    let mut field = vec![0u8; width];
    let bytes = rendered.as_bytes();
    let take = bytes.len().min(width);
    field[..take].copy_from_slice(&bytes[bytes.len() - take..]);
    field
}

/// Decodes a zero-padded ASCII decimal field back into an `f64`. Trailing
/// NUL bytes (the zero padding) are stripped before parsing.
pub fn decode_ascii_double(field: &[u8]) -> Result<f64, WireError> {
    let text_len = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let text = std::str::from_utf8(&field[..text_len])
        .map_err(|_| WireError::MalformedPacket { reason: "ascii double is not valid utf8" })?;
    text.trim()
        .parse::<f64>()
        .map_err(|_| WireError::MalformedPacket { reason: "ascii double failed to parse" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u32_round_trips() {
        let mut buf = [0u8; 4];
        write_u32(&mut buf, 0, 0xDEADBEEF);
        assert_eq!(read_u32(&buf, 0).unwrap(), 0xDEADBEEF);
    }

    #[test]
    fn u32_short_buffer_is_malformed() {
        let buf = [0u8; 2];
        assert!(read_u32(&buf, 0).is_err());
    }

    #[test]
    fn ascii_double_round_trips() {
        let field = encode_ascii_double(3.5, 32);
        assert_eq!(field.len(), 32);
        assert_eq!(decode_ascii_double(&field).unwrap(), 3.5);
    }

    #[test]
    fn ascii_double_uses_fixed_six_decimal_places() {
        let field = encode_ascii_double(3.5, 32);
        assert_eq!(&field[..8], b"3.500000");
    }

    #[test]
    fn ascii_double_is_zero_padded() {
        let field = encode_ascii_double(1.0, 16);
        assert_eq!(&field[..8], b"1.000000");
        assert_eq!(&field[8..], &[0u8; 8]);
    }
}
