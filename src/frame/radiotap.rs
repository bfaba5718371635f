//! Radiotap Capture Header
//!
//! Variable-length metadata header with a presence bitmap. Bit 31 of a
//! bitmap word chains another 32-bit word; field data starts after the
//! last word. Only the fields the tracker needs are extracted, the rest
//! advance the cursor by their fixed width. The walk never consumes past
//! the length recorded in the header, whatever the bitmap claims.
//!
//! Reference: https://www.radiotap.org/

use super::packet::{clamp_snr, PacketInfo};
use super::DecodeError;

/// Present-bitmap bits, in field order
pub mod present {
    pub const TSFT: u32 = 1 << 0;
    pub const FLAGS: u32 = 1 << 1;
    pub const RATE: u32 = 1 << 2;
    pub const CHANNEL: u32 = 1 << 3;
    pub const FHSS: u32 = 1 << 4;
    pub const DBM_ANTSIGNAL: u32 = 1 << 5;
    pub const DBM_ANTNOISE: u32 = 1 << 6;
    pub const LOCK_QUALITY: u32 = 1 << 7;
    pub const TX_ATTENUATION: u32 = 1 << 8;
    pub const DB_TX_ATTENUATION: u32 = 1 << 9;
    pub const DBM_TX_POWER: u32 = 1 << 10;
    pub const ANTENNA: u32 = 1 << 11;
    pub const DB_ANTSIGNAL: u32 = 1 << 12;
    pub const DB_ANTNOISE: u32 = 1 << 13;
    pub const RX_FLAGS: u32 = 1 << 14;
    pub const TX_FLAGS: u32 = 1 << 15;
    pub const RTS_RETRIES: u32 = 1 << 16;
    pub const DATA_RETRIES: u32 = 1 << 17;
    pub const EXT: u32 = 1 << 31;
}

/// (bit, size, alignment) for every field the walk understands.
/// Alignment is relative to the start of the radiotap header.
const FIELDS: &[(u32, usize, usize)] = &[
    (present::TSFT, 8, 8),
    (present::FLAGS, 1, 1),
    (present::RATE, 1, 1),
    (present::CHANNEL, 4, 2),
    (present::FHSS, 2, 2),
    (present::DBM_ANTSIGNAL, 1, 1),
    (present::DBM_ANTNOISE, 1, 1),
    (present::LOCK_QUALITY, 2, 2),
    (present::TX_ATTENUATION, 2, 2),
    (present::DB_TX_ATTENUATION, 2, 2),
    (present::DBM_TX_POWER, 1, 1),
    (present::ANTENNA, 1, 1),
    (present::DB_ANTSIGNAL, 1, 1),
    (present::DB_ANTNOISE, 1, 1),
    (present::RX_FLAGS, 2, 2),
    (present::TX_FLAGS, 2, 2),
    (present::RTS_RETRIES, 1, 1),
    (present::DATA_RETRIES, 1, 1),
];

/// Parse the radiotap prefix, filling the phy fields of `pkt`.
///
/// Returns the number of bytes consumed (the recorded header length).
pub fn parse_radiotap_header(data: &[u8], pkt: &mut PacketInfo) -> Result<usize, DecodeError> {
    if data.len() < 8 {
        return Err(DecodeError::Truncated {
            needed: 8,
            available: data.len(),
        });
    }

    let length = u16::from_le_bytes([data[2], data[3]]) as usize;
    if length < 8 || length > data.len() {
        return Err(DecodeError::Truncated {
            needed: length.max(8),
            available: data.len(),
        });
    }

    // Presence bitmap chain: bit 31 set means another word follows.
    let first_present = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    let mut pos = 8;
    let mut word = first_present;
    while word & present::EXT != 0 {
        if pos + 4 > length {
            return Err(DecodeError::Truncated {
                needed: pos + 4,
                available: length,
            });
        }
        word = u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]);
        pos += 4;
    }

    let mut signal = None;
    let mut noise = None;
    let mut snr = None;

    for &(bit, size, align) in FIELDS {
        if first_present & bit == 0 {
            continue;
        }
        if pos % align != 0 {
            pos += align - pos % align;
        }
        // Never walk past the recorded header length, whatever the
        // remaining bitmap bits claim.
        if pos + size > length {
            break;
        }
        match bit {
            present::RATE => pkt.phy_rate = data[pos] as u32 * 5,
            present::DBM_ANTSIGNAL => signal = Some(data[pos] as i8 as i32),
            present::DBM_ANTNOISE => noise = Some(data[pos] as i8 as i32),
            present::DB_ANTSIGNAL => snr = Some(data[pos] as i32),
            _ => {}
        }
        pos += size;
    }

    if let Some(s) = signal {
        pkt.phy_signal = s;
    }
    if let Some(n) = noise {
        pkt.phy_noise = n;
    }
    pkt.phy_snr = match (snr, signal, noise) {
        (Some(db), _, _) => clamp_snr(db),
        (None, Some(s), Some(n)) => clamp_snr(s - n),
        _ => 0,
    };

    Ok(length)
}
