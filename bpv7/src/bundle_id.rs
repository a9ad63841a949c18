/*!
Bundle identity, RFC 9171 Section 5.

A bundle is identified by its source, its creation timestamp and, for
fragments, the fragment offset and total application data unit length.
[`BundleId::to_key`] renders that identity as a compact string, suitable as
a key in maps or stores.
*/

use super::*;
use base64::prelude::*;
use thiserror::Error;

#[derive(Default, Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BundleId {
    pub source: Eid,
    pub timestamp: CreationTimestamp,
    pub fragment_info: Option<FragmentInfo>,
}

#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FragmentInfo {
    /// Offset of the fragment payload within the original payload.
    pub offset: u64,
    /// Length of the original, unfragmented, payload.
    pub total_len: u64,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Bad bundle id key")]
    BadKey,

    #[error("Bad base64 encoding")]
    BadBase64(#[from] base64::DecodeError),

    #[error("Bad source EID: {0}")]
    InvalidEid(#[from] eid::Error),

    #[error(transparent)]
    InvalidCBOR(#[from] cbor::decode::Error),
}

impl BundleId {
    pub fn from_key(k: &str) -> Result<Self, Error> {
        cbor::decode::parse_array(&BASE64_STANDARD_NO_PAD.decode(k)?, |array, _, _| {
            let id = Self {
                source: array.parse::<Eid>()?.0,
                timestamp: array.parse::<CreationTimestamp>()?.0,
                fragment_info: if array.len() == Some(4) {
                    Some(FragmentInfo {
                        offset: array.parse::<u64>()?.0,
                        total_len: array.parse::<u64>()?.0,
                    })
                } else {
                    None
                },
            };
            if array.end()?.is_none() {
                Err(Error::BadKey)
            } else {
                Ok(id)
            }
        })
        .map(|v| v.0)
    }

    pub fn to_key(&self) -> String {
        BASE64_STANDARD_NO_PAD.encode(if let Some(fragment_info) = &self.fragment_info {
            cbor::encode::emit_array(Some(4), |array| {
                array.emit(&self.source);
                array.emit(&self.timestamp);
                array.emit(&fragment_info.offset);
                array.emit(&fragment_info.total_len);
            })
        } else {
            cbor::encode::emit_array(Some(2), |array| {
                array.emit(&self.source);
                array.emit(&self.timestamp);
            })
        })
    }
}

impl core::fmt::Display for BundleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.source,
            self.timestamp.creation_time.millisecs(),
            self.timestamp.sequence_number
        )?;
        if let Some(fragment_info) = &self.fragment_info {
            write!(f, "/{}/{}", fragment_info.offset, fragment_info.total_len)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys() {
        let id = BundleId {
            source: "dtn://a/app".parse().unwrap(),
            timestamp: CreationTimestamp::new(DtnTime::new(12345), 6),
            fragment_info: None,
        };
        assert_eq!(BundleId::from_key(&id.to_key()).unwrap(), id);
        assert_eq!(id.to_string(), "dtn://a/app/12345/6");

        let id = BundleId {
            fragment_info: Some(FragmentInfo {
                offset: 100,
                total_len: 500,
            }),
            ..id
        };
        let key = id.to_key();
        assert!(!key.ends_with('='));
        assert_eq!(BundleId::from_key(&key).unwrap(), id);
        assert_eq!(id.to_string(), "dtn://a/app/12345/6/100/500");

        assert!(matches!(
            BundleId::from_key("!!!"),
            Err(Error::BadBase64(_))
        ));
        // [1, 2, 3]
        assert!(BundleId::from_key(&BASE64_STANDARD_NO_PAD.encode([0x83, 1, 2, 3])).is_err());
    }
}
