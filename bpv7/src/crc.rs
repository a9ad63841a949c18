/*!
Block CRCs, as described in RFC 9171 Section 4.2.1.

A CRC is computed over the complete CBOR encoding of a block, with the bytes of
the CRC value itself set to zero.
*/

use super::*;
use thiserror::Error;

const X25: ::crc::Crc<u16> = ::crc::Crc::<u16>::new(&::crc::CRC_16_IBM_SDLC);
const CASTAGNOLI: ::crc::Crc<u32> = ::crc::Crc::<u32>::new(&::crc::CRC_32_ISCSI);

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid CRC type {0}")]
    InvalidType(u64),

    #[error("Block has unexpected CRC value length {0}")]
    InvalidLength(usize),

    #[error("Incorrect CRC value")]
    IncorrectCrc,

    #[error(transparent)]
    InvalidCBOR(#[from] cbor::decode::Error),
}

#[allow(non_camel_case_types)]
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CrcType {
    #[default]
    None,
    CRC16_X25,
    CRC32_CASTAGNOLI,
}

impl CrcType {
    /// Width of the encoded CRC value in bytes.
    fn width(self) -> usize {
        match self {
            CrcType::None => 0,
            CrcType::CRC16_X25 => 2,
            CrcType::CRC32_CASTAGNOLI => 4,
        }
    }
}

impl TryFrom<u64> for CrcType {
    type Error = self::Error;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::CRC16_X25),
            2 => Ok(Self::CRC32_CASTAGNOLI),
            v => Err(Error::InvalidType(v)),
        }
    }
}

impl From<CrcType> for u64 {
    fn from(value: CrcType) -> Self {
        match value {
            CrcType::None => 0,
            CrcType::CRC16_X25 => 1,
            CrcType::CRC32_CASTAGNOLI => 2,
        }
    }
}

impl cbor::encode::ToCbor for CrcType {
    fn to_cbor(&self, encoder: &mut cbor::encode::Encoder) {
        encoder.emit(&u64::from(*self))
    }
}

/// CRC-16/X-25 of `data`.
pub fn compute16(data: &[u8]) -> u16 {
    X25.checksum(data)
}

/// CRC-32C (Castagnoli) of `data`.
pub fn compute32(data: &[u8]) -> u32 {
    CASTAGNOLI.checksum(data)
}

/// Checks `expected` against the CRC of `data`. [`CrcType::None`] always verifies.
pub fn verify(data: &[u8], crc_type: CrcType, expected: u32) -> bool {
    match crc_type {
        CrcType::None => true,
        CrcType::CRC16_X25 => compute16(data) as u32 == expected,
        CrcType::CRC32_CASTAGNOLI => compute32(data) == expected,
    }
}

/// Reads the CRC value field of a block.
///
/// Returns `None` if the block has no further items.
pub(crate) fn parse_crc_value(
    block: &mut cbor::decode::Array,
    crc_type: CrcType,
) -> Result<Option<(u32, bool)>, Error> {
    block
        .try_parse_value(|value, shortest, tags| match value {
            cbor::decode::Value::Bytes(crc) => {
                let crc_value = match crc_type {
                    CrcType::CRC16_X25 => <[u8; 2]>::try_from(crc)
                        .map(|crc| u16::from_be_bytes(crc) as u32)
                        .map_err(|_| Error::InvalidLength(crc.len()))?,
                    CrcType::CRC32_CASTAGNOLI => <[u8; 4]>::try_from(crc)
                        .map(u32::from_be_bytes)
                        .map_err(|_| Error::InvalidLength(crc.len()))?,
                    CrcType::None => return Err(Error::InvalidLength(crc.len())),
                };
                Ok((crc_value, shortest && tags.is_empty()))
            }
            value => Err(cbor::decode::Error::IncorrectType(
                "Definite-length Byte String".to_string(),
                value.type_name(!tags.is_empty()),
            )
            .into()),
        })
        .map(|o| o.map(|(v, _)| v))
}

/// Checks a CRC value read from `data`, the complete encoding of a block,
/// where the CRC value ended at `crc_value_end`.
pub(crate) fn check_crc_value(
    data: &[u8],
    crc_type: CrcType,
    crc_value: u32,
    crc_value_end: usize,
) -> Result<(), Error> {
    let crc_value_start = crc_value_end - crc_type.width();
    let zeros = [0u8; 4];
    let zeros = &zeros[..crc_type.width()];
    let matches = match crc_type {
        CrcType::None => true,
        CrcType::CRC16_X25 => {
            let mut digest = X25.digest();
            digest.update(&data[..crc_value_start]);
            digest.update(zeros);
            digest.update(&data[crc_value_end..]);
            digest.finalize() as u32 == crc_value
        }
        CrcType::CRC32_CASTAGNOLI => {
            let mut digest = CASTAGNOLI.digest();
            digest.update(&data[..crc_value_start]);
            digest.update(zeros);
            digest.update(&data[crc_value_end..]);
            digest.finalize() == crc_value
        }
    };
    if matches {
        Ok(())
    } else {
        Err(Error::IncorrectCrc)
    }
}

/// Appends the CRC value to `data`, a block encoded as a definite-length
/// array whose final item has been skipped.
pub(crate) fn append_crc_value(crc_type: CrcType, mut data: Vec<u8>) -> Vec<u8> {
    match crc_type {
        CrcType::None => {}
        CrcType::CRC16_X25 => {
            data.push(0x42);
            let mut digest = X25.digest();
            digest.update(&data);
            digest.update(&[0; 2]);
            data.extend_from_slice(&digest.finalize().to_be_bytes());
        }
        CrcType::CRC32_CASTAGNOLI => {
            data.push(0x44);
            let mut digest = CASTAGNOLI.digest();
            digest.update(&data);
            digest.update(&[0; 4]);
            data.extend_from_slice(&digest.finalize().to_be_bytes());
        }
    }
    data
}

/// Reads back the CRC value appended by [`append_crc_value`].
pub(crate) fn trailing_crc_value(crc_type: CrcType, data: &[u8]) -> Option<u32> {
    let value = data.get(data.len().checked_sub(crc_type.width())?..)?;
    match crc_type {
        CrcType::None => None,
        CrcType::CRC16_X25 => Some(u16::from_be_bytes([value[0], value[1]]) as u32),
        CrcType::CRC32_CASTAGNOLI => Some(u32::from_be_bytes([
            value[0], value[1], value[2], value[3],
        ])),
    }
}
