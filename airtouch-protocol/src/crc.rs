//! Modbus CRC-16 used to validate every frame.
//!
//! Outbound encoding and inbound validation both go through [`Crc16`], so the
//! two directions cannot drift apart.

const INITIAL: u16 = 0xffff;
const POLYNOMIAL: u16 = 0xa001;

/// Incremental Modbus CRC-16 hasher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc16(u16);

impl Crc16 {
    pub fn new() -> Self {
        Self(INITIAL)
    }

    /// Feeds more bytes into the running checksum.
    pub fn update(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 ^= u16::from(byte);
            for _ in 0..8 {
                if self.0 & 0x0001 != 0 {
                    self.0 = (self.0 >> 1) ^ POLYNOMIAL;
                } else {
                    self.0 >>= 1;
                }
            }
        }
    }

    pub fn finish(&self) -> u16 {
        self.0
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes the Modbus CRC-16 of `bytes`.
pub fn crc16(bytes: &[u8]) -> u16 {
    let mut crc = Crc16::new();
    crc.update(bytes);
    crc.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_check_string() {
        assert_eq!(crc16(b"123456789"), 0x4b37);
    }

    #[test]
    fn test_modbus_read_holding_registers() {
        // 01 03 00 00 00 0A is sent on the wire followed by C5 CD
        assert_eq!(crc16(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x0a]), 0xcdc5);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(crc16(&[]), 0xffff);
    }

    #[test]
    fn test_default_matches_new() {
        assert_eq!(Crc16::default(), Crc16::new());
    }

    proptest! {
        #[test]
        fn prop_deterministic(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            prop_assert_eq!(crc16(&data), crc16(&data));
        }

        #[test]
        fn prop_incremental_matches_one_shot(
            data in proptest::collection::vec(any::<u8>(), 0..512),
            split in 0usize..512,
        ) {
            let split = split.min(data.len());
            let mut crc = Crc16::new();
            crc.update(&data[..split]);
            crc.update(&data[split..]);
            prop_assert_eq!(crc.finish(), crc16(&data));
        }
    }
}
