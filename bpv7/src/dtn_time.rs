use super::*;

const DTN_EPOCH: time::OffsetDateTime = time::macros::datetime!(2000-01-01 00:00:00 UTC);

/// Milliseconds since the DTN epoch, 2000-01-01T00:00:00Z.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct DtnTime {
    millisecs: u64,
}

impl DtnTime {
    pub fn now() -> Self {
        Self::try_from(time::OffsetDateTime::now_utc()).unwrap_or_default()
    }

    pub fn new(millisecs: u64) -> Self {
        Self { millisecs }
    }

    pub fn millisecs(&self) -> u64 {
        self.millisecs
    }

    /// Milliseconds elapsed from `earlier` to `self`, or 0 if `earlier` is later.
    pub fn saturating_sub(&self, earlier: DtnTime) -> u64 {
        self.millisecs.saturating_sub(earlier.millisecs)
    }
}

impl cbor::encode::ToCbor for DtnTime {
    fn to_cbor(&self, encoder: &mut cbor::encode::Encoder) {
        encoder.emit(&self.millisecs)
    }
}

impl cbor::decode::FromCbor for DtnTime {
    type Error = cbor::decode::Error;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, bool, usize)>, Self::Error> {
        Ok(cbor::decode::try_parse::<u64>(data)?
            .map(|(millisecs, shortest, len)| (Self { millisecs }, shortest, len)))
    }
}

impl TryFrom<time::OffsetDateTime> for DtnTime {
    type Error = time::error::ConversionRange;

    fn try_from(instant: time::OffsetDateTime) -> Result<Self, Self::Error> {
        u64::try_from((instant - DTN_EPOCH).whole_milliseconds())
            .map(|millisecs| Self { millisecs })
            .map_err(|_| time::error::ConversionRange)
    }
}

impl From<DtnTime> for time::OffsetDateTime {
    fn from(dtn_time: DtnTime) -> Self {
        DTN_EPOCH.saturating_add(time::Duration::milliseconds(
            i64::try_from(dtn_time.millisecs).unwrap_or(i64::MAX),
        ))
    }
}

impl core::fmt::Display for DtnTime {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let instant = time::OffsetDateTime::from(*self)
            .format(&time::format_description::well_known::Rfc3339)
            .map_err(|_| core::fmt::Error)?;
        f.write_str(&instant)
    }
}
