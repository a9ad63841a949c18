use super::*;

/// Block-type-specific data of a Hop Count block, RFC 9171 Section 4.4.3.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HopInfo {
    pub limit: u64,
    pub count: u64,
}

impl HopInfo {
    pub fn exceeded(&self) -> bool {
        self.count > self.limit
    }
}

impl cbor::encode::ToCbor for HopInfo {
    fn to_cbor(&self, encoder: &mut cbor::encode::Encoder) {
        encoder.emit_array(Some(2), |a| {
            a.emit(&self.limit);
            a.emit(&self.count);
        })
    }
}

impl cbor::decode::FromCbor for HopInfo {
    type Error = cbor::decode::Error;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, bool, usize)>, Self::Error> {
        cbor::decode::try_parse_array(data, |a, shortest, tags| {
            let (limit, s1) = a.parse::<u64>()?;
            let (count, s2) = a.parse::<u64>()?;
            Ok::<_, cbor::decode::Error>((
                HopInfo { limit, count },
                shortest && tags.is_empty() && a.is_definite() && s1 && s2,
            ))
        })
        .map(|o| o.map(|((v, s), len)| (v, s, len)))
    }
}
