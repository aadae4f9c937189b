//! Hex encoding for frame dumps

use std::fmt::Write;

/// Encode bytes to uppercase hex string
/// Example: [0x12, 0x34, 0xAB] -> "1234AB"
pub fn encode_upper(data: &[u8]) -> String {
    let mut result = String::with_capacity(data.len() * 2);
    for byte in data {
        // Writing to String buffer is infallible
        let _ = write!(&mut result, "{:02X}", byte);
    }
    result
}

/// Encode bytes to space-separated uppercase hex, the way bus traces are read
/// Example: [0xF7, 0x08, 0x00] -> "F7 08 00"
pub fn encode_upper_spaced(data: &[u8]) -> String {
    let mut result = String::with_capacity(data.len() * 3);
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            result.push(' ');
        }
        let _ = write!(&mut result, "{:02X}", byte);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_upper() {
        assert_eq!(encode_upper(&[0x12, 0x34, 0xAB]), "1234AB");
        assert_eq!(encode_upper(&[0x0F]), "0F");
        assert_eq!(encode_upper(&[]), "");
    }

    #[test]
    fn test_encode_upper_spaced() {
        assert_eq!(encode_upper_spaced(&[0xF7, 0x08, 0x00, 0x02]), "F7 08 00 02");
        assert_eq!(encode_upper_spaced(&[0x05]), "05");
        assert_eq!(encode_upper_spaced(&[]), "");
    }
}
