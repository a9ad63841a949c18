/*!
Endpoint identifiers, RFC 9171 Section 4.2.5.1.

The `dtn` and `ipn` schemes are understood. EIDs of any other scheme are
carried opaquely so that bundles using them can still be decoded and
re-encoded unchanged.

The text forms are:

* `dtn:none`, the null endpoint.
* `dtn://node/demux`, where `node` is percent-encoded.
* `ipn:node.service`.
*/

use super::*;
use error::CaptureFieldErr;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_encode};
use thiserror::Error;

// Encode set matching RFC 3986 unreserved characters (keeps alphanumerics, -, _, ., ~)
const URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

mod error;
mod parse;

pub use error::Error;


#[cfg(test)]
mod cbor_tests;


#[derive(Default, Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(into = "String", try_from = "String")
)]
pub enum Eid {
    /// The null endpoint, `dtn:none`.
    #[default]
    Null,
    Dtn {
        node_name: Box<str>,
        demux: Box<str>,
    },
    Ipn {
        node_number: u64,
        service_number: u64,
    },
    /// An EID of an unsupported scheme, holding the raw CBOR of its
    /// scheme-specific part.
    Unknown {
        scheme: u64,
        data: Box<[u8]>,
    },
}

fn is_vchar(c: char) -> bool {
    ('\x21'..='\x7e').contains(&c)
}

impl Eid {
    /// A `dtn` scheme EID. `node_name` must not be empty, and `demux` must be
    /// printable ASCII.
    pub fn dtn(node_name: &str, demux: &str) -> Result<Self, Error> {
        if node_name.is_empty() {
            return Err(Error::DtnNodeNameEmpty);
        }
        if !demux.chars().all(is_vchar) {
            return Err(Error::DtnInvalidDemux);
        }
        Ok(Eid::Dtn {
            node_name: node_name.into(),
            demux: demux.into(),
        })
    }

    /// An `ipn` scheme EID. `ipn:0.0` is the null endpoint.
    pub fn ipn(node_number: u64, service_number: u64) -> Result<Self, Error> {
        match (node_number, service_number) {
            (0, 0) => Ok(Eid::Null),
            (0, service_number) => Err(Error::IpnInvalidServiceNumber(service_number)),
            (node_number, service_number) => Ok(Eid::Ipn {
                node_number,
                service_number,
            }),
        }
    }

    /// Returns `true` the Eid is the 'null endpoint' as defined in RFC 9171.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Eid::Null)
    }

    /// Checks that the EID survives encoding: that decoding its CBOR form
    /// gives back the same value.
    ///
    /// [`Eid::dtn`], [`Eid::ipn`] and the decoders only produce EIDs that
    /// pass, but the variants can also be built directly.
    pub fn validate(&self) -> Result<(), Error> {
        match self {
            Eid::Null => Ok(()),
            Eid::Dtn { node_name, demux } => Eid::dtn(node_name, demux).map(|_| ()),
            Eid::Ipn {
                node_number: 0,
                service_number: 0,
            } => Err(Error::IpnNullEndpoint),
            Eid::Ipn {
                node_number: 0,
                service_number,
            } => Err(Error::IpnInvalidServiceNumber(*service_number)),
            Eid::Ipn { .. } => Ok(()),
            Eid::Unknown { scheme: 0, .. } => Err(Error::UnsupportedScheme(0)),
            Eid::Unknown {
                scheme: scheme @ (1 | 2),
                ..
            } => Err(Error::OpaqueKnownScheme(*scheme)),
            Eid::Unknown { data, .. } => {
                let (_, len) = cbor::decode::parse_value(data, |mut value, _, _| value.skip(16))?;
                if len != data.len() {
                    return Err(cbor::decode::Error::AdditionalItems.into());
                }
                Ok(())
            }
        }
    }

    /// The CBOR scheme code.
    pub fn scheme(&self) -> u64 {
        match self {
            Eid::Null | Eid::Dtn { .. } => 1,
            Eid::Ipn { .. } => 2,
            Eid::Unknown { scheme, .. } => *scheme,
        }
    }
}

impl cbor::encode::ToCbor for Eid {
    fn to_cbor(&self, encoder: &mut cbor::encode::Encoder) {
        match self {
            Eid::Null => encoder.emit(&(1u64, 0u64)),
            Eid::Dtn { node_name, demux } => encoder.emit(&(
                1u64,
                format!(
                    "//{}/{demux}",
                    percent_encode(node_name.as_bytes(), URI_ENCODE_SET)
                ),
            )),
            Eid::Ipn {
                node_number,
                service_number,
            } => encoder.emit(&(2u64, (*node_number, *service_number))),
            Eid::Unknown { scheme, data } => encoder.emit(&(*scheme, cbor::encode::Raw(data))),
        }
    }
}

fn ipn_from_cbor(a: &mut cbor::decode::Array, shortest: bool) -> Result<(Eid, bool), Error> {
    let (node_number, s1) = a.parse::<u64>()?;
    let (service_number, s2) = a.parse::<u64>()?;
    Eid::ipn(node_number, service_number).map(|eid| (eid, shortest && s1 && s2))
}

impl cbor::decode::FromCbor for Eid {
    type Error = self::Error;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, bool, usize)>, Self::Error> {
        cbor::decode::try_parse_array(data, |a, shortest, tags| {
            let mut shortest = shortest && tags.is_empty() && a.is_definite();

            let (scheme, s) = a.parse::<u64>().map_field_err("EID scheme")?;
            shortest = shortest && s;

            match scheme {
                0 => Err(Error::UnsupportedScheme(0)),
                1 => a
                    .parse_value(|value, s, tags| {
                        let shortest = shortest && s && tags.is_empty();
                        match value {
                            cbor::decode::Value::UnsignedInteger(0)
                            | cbor::decode::Value::Text("none") => Ok((Eid::Null, shortest)),
                            cbor::decode::Value::Text(s) => {
                                parse::parse_dtn_ssp(s).map(|e| (e, shortest))
                            }
                            cbor::decode::Value::TextStream(s) => {
                                parse::parse_dtn_ssp(&s.concat()).map(|e| (e, false))
                            }
                            value => Err(cbor::decode::Error::IncorrectType(
                                "Untagged Text String or 0".to_string(),
                                value.type_name(!tags.is_empty()),
                            )
                            .into()),
                        }
                    })
                    .map(|(v, _)| v)
                    .map_field_err("'dtn' scheme-specific part"),
                2 => a
                    .parse_value(|value, s, tags| match value {
                        cbor::decode::Value::Array(a) => {
                            let s = shortest && s && tags.is_empty() && a.is_definite();
                            ipn_from_cbor(a, s)
                        }
                        value => Err(cbor::decode::Error::IncorrectType(
                            "Untagged Array".to_string(),
                            value.type_name(!tags.is_empty()),
                        )
                        .into()),
                    })
                    .map(|(v, _)| v)
                    .map_field_err("'ipn' scheme-specific part"),
                scheme => {
                    let start = a.offset();
                    match a.skip_value(16)? {
                        None => Err(Error::UnsupportedScheme(scheme)),
                        Some(s) => Ok((
                            Eid::Unknown {
                                scheme,
                                data: data[start..a.offset()].into(),
                            },
                            shortest && s,
                        )),
                    }
                }
            }
        })
        .map(|o| o.map(|((v, s), len)| (v, s, len)))
    }
}

#[derive(Error, Debug)]
enum DisplayError {
    #[error(transparent)]
    Decode(#[from] cbor::decode::Error),

    #[error(transparent)]
    Fmt(#[from] core::fmt::Error),
}

impl From<Eid> for String {
    fn from(value: Eid) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for Eid {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl core::fmt::Display for Eid {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Eid::Null => f.write_str("dtn:none"),
            Eid::Ipn {
                node_number,
                service_number,
            } => write!(f, "ipn:{node_number}.{service_number}"),
            Eid::Dtn { node_name, demux } => write!(
                f,
                "dtn://{}/{demux}",
                percent_encode(node_name.as_bytes(), URI_ENCODE_SET)
            ),
            Eid::Unknown { scheme, data } => {
                let r = cbor::decode::parse_value(data, |mut value, _, _| {
                    write!(f, "unknown({scheme}):{value:?}").map_err(DisplayError::from)?;
                    value.skip(16).map_err(DisplayError::from)
                });
                match r {
                    Ok(_) => Ok(()),
                    Err(DisplayError::Fmt(e)) => Err(e),
                    Err(DisplayError::Decode(e)) => write!(f, "unknown({scheme}):error: {e}"),
                }
            }
        }
    }
}
