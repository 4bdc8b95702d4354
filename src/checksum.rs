//! Item checksums for the configuration store.

/// Which checksum guards the configuration items.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum ChecksumKind {
    /// CRC-16/X-25 over the unaligned item data.
    #[default]
    Crc16,
    /// Always `0`. Reads images written by firmware that never filled in the checksum;
    /// such a store is integrity-unverified.
    Disabled,
}

impl ChecksumKind {
    /// Checksum of `data` under this scheme.
    pub fn compute(self, data: &[u8]) -> u16 {
        match self {
            ChecksumKind::Crc16 => !data.iter().fold(0xffff, crc_ccitt_update),
            ChecksumKind::Disabled => 0,
        }
    }
}

/// One step of the reflected CRC-CCITT (poly 0x8408).
pub(crate) fn crc_ccitt_update(crc: u16, data: &u8) -> u16 {
    let mut d = *data as u16;
    d ^= lo8(crc);
    d ^= d << 4;
    d = (d as u8) as u16;

    ((d << 8) | hi8(crc)) ^ (((d >> 4) as u8) as u16) ^ (d << 3)
}

fn lo8(x: u16) -> u16 {
    x & 0xff
}

fn hi8(x: u16) -> u16 {
    x >> 8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc16_check_value() {
        assert_eq!(ChecksumKind::Crc16.compute(b"123456789"), 0x906e);
    }

    #[test]
    fn test_crc16_detects_single_bit_flip() {
        let good = ChecksumKind::Crc16.compute(b"room_0");
        let bad = ChecksumKind::Crc16.compute(b"roon_0");
        assert_ne!(good, bad);
    }

    #[test]
    fn test_disabled_is_always_zero() {
        assert_eq!(ChecksumKind::Disabled.compute(b"anything"), 0);
        assert_eq!(ChecksumKind::Disabled.compute(&[]), 0);
    }
}
