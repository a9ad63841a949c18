/*!
Error types returned by bundle construction and decoding.

[`ValidationError`] covers structural rules that a [`Bundle`] must satisfy
however it was created. [`DecodeError`] covers everything that can go wrong
turning bytes into a bundle, and wraps [`ValidationError`] for bundles that
are well-formed CBOR but structurally invalid.
*/

use super::*;
use thiserror::Error;

/// A structural rule of RFC 9171 that a bundle breaks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The bundle has no payload block.
    #[error("Bundle has no payload block")]
    MissingPayload,

    /// More than one block has the same block number.
    #[error("Bundle has more than one block with block number {0}")]
    DuplicateBlockNumber(u64),

    /// The fragment flag and the presence of fragment fields disagree.
    #[error("Bundle fragment flag does not match the presence of fragment fields")]
    FragmentFieldMismatch,

    /// A block has a block number that is not valid for its type.
    #[error("{1:?} block cannot be block number {0}")]
    InvalidBlockNumber(u64, BlockType),

    /// The payload block is not the last block.
    #[error("Final block of bundle is not a payload block")]
    PayloadNotFinal,

    /// More than one block of a type that must be unique.
    #[error("Bundle has multiple {0:?} blocks")]
    DuplicateBlocks(BlockType),

    /// The fragment offset is not within the total application data unit.
    #[error("Invalid fragment information: offset {0}, total length {1}")]
    InvalidFragmentInfo(u64, u64),

    /// An invalid combination of bundle processing control flags.
    #[error("Invalid bundle flag combination")]
    InvalidFlags,

    /// The source has no clock, and there is no Bundle Age block.
    #[error("Bundle source has no clock, and there is no Bundle Age extension block")]
    MissingBundleAge,

    /// A primary block EID would not decode back to the same value.
    #[error("Invalid {field} EID: {reason}")]
    InvalidEid { field: &'static str, reason: String },

    /// The data of a known extension block does not decode.
    #[error("Extension block {0} has invalid block-type-specific data")]
    InvalidExtensionBlock(u64),
}

/// Failure to decode a bundle from its CBOR encoding.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error(transparent)]
    MalformedCbor(#[from] cbor::decode::Error),

    #[error("Bundle has {0} blocks, a primary and a payload block are required")]
    TooFewBlocks(usize),

    #[error("Block {block_number} has the wrong number of fields, expected {expected}")]
    FieldCountMismatch { block_number: u64, expected: usize },

    #[error("Block {block_number} has an incorrect CRC value")]
    CrcMismatch { block_number: u64 },

    #[error(transparent)]
    InvalidEndpoint(eid::Error),

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("Unsupported bundle protocol version {0}")]
    InvalidVersion(u64),

    #[error("Invalid CRC type {0}")]
    InvalidCrcType(u64),

    #[error("Block has unexpected CRC value length {0}")]
    InvalidCrcLength(usize),

    #[error("Bundle has additional data after end of CBOR array")]
    AdditionalData,

    #[error("Bundle is not in canonical CBOR form")]
    NonCanonical,
}

impl From<eid::Error> for DecodeError {
    fn from(value: eid::Error) -> Self {
        match value {
            eid::Error::InvalidCBOR(e) => Self::MalformedCbor(e),
            e => Self::InvalidEndpoint(e),
        }
    }
}

impl DecodeError {
    pub(crate) fn from_crc(block_number: u64) -> impl FnOnce(crc::Error) -> Self {
        move |e| match e {
            crc::Error::InvalidType(t) => Self::InvalidCrcType(t),
            crc::Error::InvalidLength(l) => Self::InvalidCrcLength(l),
            crc::Error::IncorrectCrc => Self::CrcMismatch { block_number },
            crc::Error::InvalidCBOR(e) => Self::MalformedCbor(e),
        }
    }
}
