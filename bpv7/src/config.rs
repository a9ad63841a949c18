use super::*;

/// Settings shared by the [`Builder`] and the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// CRC type given to blocks created by the [`Builder`].
    pub crc_type: CrcType,

    /// Default bundle lifetime, in milliseconds.
    pub lifetime: u64,

    /// If set, built bundles carry a Hop Count block with this limit.
    pub hop_limit: Option<u64>,

    /// Reject bundles that are not in canonical form: any item not in
    /// shortest form, or any block that is an indefinite-length array.
    pub require_canonical: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crc_type: CrcType::CRC32_CASTAGNOLI,
            lifetime: 24 * 60 * 60 * 1000,
            hop_limit: None,
            require_canonical: false,
        }
    }
}
