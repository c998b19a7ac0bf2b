//! CRC-64 checksum used by the OpenIGTLink header
//!
//! OpenIGTLink protects every body with CRC-64/ECMA-182: polynomial
//! `0x42F0E1EBA9EA3693`, initial value 0, no reflection, no final xor.

/// ECMA-182 polynomial
pub const CRC64_POLY: u64 = 0x42F0_E1EB_A9EA_3693;

const CRC_TABLE: [u64; 256] = build_table();

const fn build_table() -> [u64; 256] {
    let mut table = [0u64; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u64) << 56;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & (1 << 63) != 0 {
                (crc << 1) ^ CRC64_POLY
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Calculate the CRC-64 of a message body
///
/// # Examples
///
/// ```
/// use openigtlink_provider::protocol::crc::calculate_crc;
///
/// assert_eq!(calculate_crc(b"123456789"), 0x6C40_DF5F_0B49_7347);
/// assert_eq!(calculate_crc(&[]), 0);
/// ```
pub fn calculate_crc(data: &[u8]) -> u64 {
    update_crc(0, data)
}

/// Continue a CRC-64 computation over another chunk
pub fn update_crc(crc: u64, data: &[u8]) -> u64 {
    data.iter().fold(crc, |crc, &byte| {
        CRC_TABLE[(((crc >> 56) as u8) ^ byte) as usize] ^ (crc << 8)
    })
}

/// Check a body against the CRC carried in its header
pub fn verify_crc(data: &[u8], expected: u64) -> bool {
    calculate_crc(data) == expected
}
