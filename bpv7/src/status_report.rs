/*!
Administrative records and bundle status reports, RFC 9171 Section 6.1.

An administrative record is carried as the payload of a bundle with the
`is_admin_record` flag set. The only record type defined by RFC 9171 is the
bundle status report (type 1); records of other types are kept as opaque
CBOR so they survive a round trip.
*/

use super::*;
use thiserror::Error;

const STATUS_REPORT_TYPE: u64 = 1;

/// Lifetime of generated status report bundles: one hour.
const STATUS_REPORT_LIFETIME: u64 = 60 * 60 * 1000;

#[derive(Error, Debug)]
pub enum StatusReportError {
    #[error("Reserved status report reason code 255")]
    ReservedReasonCode,

    #[error("Bundle is not an administrative record")]
    NotAdminRecord,

    #[error("Failed to parse {field}: {source}")]
    InvalidField {
        field: &'static str,
        source: Box<dyn core::error::Error + Send + Sync>,
    },

    #[error(transparent)]
    InvalidCBOR(#[from] cbor::decode::Error),
}

trait CaptureFieldErr<T> {
    fn map_field_err(self, field: &'static str) -> Result<T, StatusReportError>;
}

impl<T, E: Into<Box<dyn core::error::Error + Send + Sync>>> CaptureFieldErr<T> for Result<T, E> {
    fn map_field_err(self, field: &'static str) -> Result<T, StatusReportError> {
        self.map_err(|e| StatusReportError::InvalidField {
            field,
            source: e.into(),
        })
    }
}

/// Status report reason codes, RFC 9171 Section 9.5.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReasonCode {
    #[default]
    NoInformation,
    LifetimeExpired,
    ForwardedOverUnidirectionalLink,
    TransmissionCanceled,
    DepletedStorage,
    DestinationUnintelligible,
    NoRoute,
    NoTimelyContact,
    BlockUnintelligible,
    HopLimitExceeded,
    TrafficPared,
    BlockUnsupported,
    Other(u64),
}

impl From<ReasonCode> for u64 {
    fn from(value: ReasonCode) -> Self {
        match value {
            ReasonCode::NoInformation => 0,
            ReasonCode::LifetimeExpired => 1,
            ReasonCode::ForwardedOverUnidirectionalLink => 2,
            ReasonCode::TransmissionCanceled => 3,
            ReasonCode::DepletedStorage => 4,
            ReasonCode::DestinationUnintelligible => 5,
            ReasonCode::NoRoute => 6,
            ReasonCode::NoTimelyContact => 7,
            ReasonCode::BlockUnintelligible => 8,
            ReasonCode::HopLimitExceeded => 9,
            ReasonCode::TrafficPared => 10,
            ReasonCode::BlockUnsupported => 11,
            ReasonCode::Other(v) => v,
        }
    }
}

impl TryFrom<u64> for ReasonCode {
    type Error = StatusReportError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::NoInformation),
            1 => Ok(Self::LifetimeExpired),
            2 => Ok(Self::ForwardedOverUnidirectionalLink),
            3 => Ok(Self::TransmissionCanceled),
            4 => Ok(Self::DepletedStorage),
            5 => Ok(Self::DestinationUnintelligible),
            6 => Ok(Self::NoRoute),
            7 => Ok(Self::NoTimelyContact),
            8 => Ok(Self::BlockUnintelligible),
            9 => Ok(Self::HopLimitExceeded),
            10 => Ok(Self::TrafficPared),
            11 => Ok(Self::BlockUnsupported),
            255 => Err(StatusReportError::ReservedReasonCode),
            v => Ok(Self::Other(v)),
        }
    }
}

impl cbor::encode::ToCbor for ReasonCode {
    fn to_cbor(&self, encoder: &mut cbor::encode::Encoder) {
        encoder.emit(&u64::from(*self))
    }
}

impl cbor::decode::FromCbor for ReasonCode {
    type Error = StatusReportError;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, bool, usize)>, Self::Error> {
        match cbor::decode::try_parse::<u64>(data)? {
            Some((v, shortest, len)) => Ok(Some((v.try_into()?, shortest, len))),
            None => Ok(None),
        }
    }
}

/// One entry of the bundle status information array.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Status {
    #[default]
    NotAsserted,
    Asserted,
    /// Asserted, with the time it happened, when the subject bundle asked
    /// for status times.
    AssertedAt(DtnTime),
}

impl cbor::encode::ToCbor for Status {
    fn to_cbor(&self, encoder: &mut cbor::encode::Encoder) {
        match self {
            Status::NotAsserted => encoder.emit_array(Some(1), |a| a.emit(&false)),
            Status::Asserted => encoder.emit_array(Some(1), |a| a.emit(&true)),
            Status::AssertedAt(time) => encoder.emit(&(true, *time)),
        }
    }
}

impl cbor::decode::FromCbor for Status {
    type Error = StatusReportError;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, bool, usize)>, Self::Error> {
        cbor::decode::try_parse_array(data, |a, shortest, tags| {
            let mut shortest = shortest && tags.is_empty() && a.is_definite();

            let (asserted, s) = a.parse::<bool>().map_field_err("Status asserted")?;
            shortest = shortest && s;

            if !asserted {
                return Ok((Status::NotAsserted, shortest));
            }
            match a.try_parse::<DtnTime>().map_field_err("Status time")? {
                Some((time, s)) => Ok((Status::AssertedAt(time), shortest && s)),
                None => Ok((Status::Asserted, shortest)),
            }
        })
        .map(|o| o.map(|((v, s), len)| (v, s, len)))
    }
}

/// The four positions of the bundle status information array.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StatusKind {
    Received,
    Forwarded,
    Delivered,
    Deleted,
}

/// A bundle status report, RFC 9171 Section 6.1.1.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub received: Status,
    pub forwarded: Status,
    pub delivered: Status,
    pub deleted: Status,
    pub reason: ReasonCode,
    /// The bundle the report is about.
    pub bundle_id: BundleId,
}

impl StatusReport {
    /// A report asserting `kind` for `subject` at `time`.
    ///
    /// The time is only included if the subject bundle has the
    /// `report_status_time` flag set.
    pub fn new(subject: &Bundle, kind: StatusKind, reason: ReasonCode, time: DtnTime) -> Self {
        let status = if subject.flags().report_status_time {
            Status::AssertedAt(time)
        } else {
            Status::Asserted
        };

        let mut report = Self {
            reason,
            bundle_id: subject.id(),
            ..Default::default()
        };
        *match kind {
            StatusKind::Received => &mut report.received,
            StatusKind::Forwarded => &mut report.forwarded,
            StatusKind::Delivered => &mut report.delivered,
            StatusKind::Deleted => &mut report.deleted,
        } = status;
        report
    }
}

impl cbor::encode::ToCbor for StatusReport {
    fn to_cbor(&self, encoder: &mut cbor::encode::Encoder) {
        let fragment_info = self.bundle_id.fragment_info;
        encoder.emit_array(Some(fragment_info.map_or(4, |_| 6)), |a| {
            a.emit_array(Some(4), |a| {
                a.emit(&self.received);
                a.emit(&self.forwarded);
                a.emit(&self.delivered);
                a.emit(&self.deleted);
            });
            a.emit(&self.reason);
            a.emit(&self.bundle_id.source);
            a.emit(&self.bundle_id.timestamp);
            if let Some(fragment_info) = fragment_info {
                a.emit(&fragment_info.offset);
                a.emit(&fragment_info.total_len);
            }
        })
    }
}

impl cbor::decode::FromCbor for StatusReport {
    type Error = StatusReportError;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, bool, usize)>, Self::Error> {
        cbor::decode::try_parse_array(data, |a, shortest, tags| {
            let mut shortest = shortest && tags.is_empty() && a.is_definite();
            let mut report = Self::default();

            a.parse_array(|a, s, tags| {
                shortest = shortest && s && tags.is_empty() && a.is_definite();
                for (status, field) in [
                    (&mut report.received, "Received status"),
                    (&mut report.forwarded, "Forwarded status"),
                    (&mut report.delivered, "Delivered status"),
                    (&mut report.deleted, "Deleted status"),
                ] {
                    let (v, s) = a.parse::<Status>().map_field_err(field)?;
                    *status = v;
                    shortest = shortest && s;
                }
                Ok::<_, StatusReportError>(())
            })
            .map_field_err("Bundle status information")?;

            let (reason, s1) = a.parse::<ReasonCode>().map_field_err("Reason code")?;
            let (source, s2) = a.parse::<Eid>().map_field_err("Source")?;
            let (timestamp, s3) = a
                .parse::<CreationTimestamp>()
                .map_field_err("Creation timestamp")?;
            shortest = shortest && s1 && s2 && s3;

            let fragment_info = match a.try_parse::<u64>().map_field_err("Fragment offset")? {
                Some((offset, s1)) => {
                    let (total_len, s2) = a.parse::<u64>().map_field_err("Total length")?;
                    shortest = shortest && s1 && s2;
                    Some(FragmentInfo { offset, total_len })
                }
                None => None,
            };

            report.reason = reason;
            report.bundle_id = BundleId {
                source,
                timestamp,
                fragment_info,
            };
            Ok((report, shortest))
        })
        .map(|o| o.map(|((v, s), len)| (v, s, len)))
    }
}

/// An administrative record, `[record type, record content]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdministrativeRecord {
    StatusReport(StatusReport),
    /// A record type this crate does not interpret; `data` is the encoded
    /// record content.
    Unknown { record_type: u64, data: Box<[u8]> },
}

impl cbor::encode::ToCbor for AdministrativeRecord {
    fn to_cbor(&self, encoder: &mut cbor::encode::Encoder) {
        match self {
            AdministrativeRecord::StatusReport(report) => {
                encoder.emit(&(STATUS_REPORT_TYPE, report))
            }
            AdministrativeRecord::Unknown { record_type, data } => {
                encoder.emit(&(*record_type, cbor::encode::Raw(data)))
            }
        }
    }
}

impl cbor::decode::FromCbor for AdministrativeRecord {
    type Error = StatusReportError;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, bool, usize)>, Self::Error> {
        cbor::decode::try_parse_array(data, |a, shortest, tags| {
            let shortest = shortest && tags.is_empty() && a.is_definite();

            let (record_type, s) = a.parse::<u64>().map_field_err("Record type")?;
            let shortest = shortest && s;

            if record_type == STATUS_REPORT_TYPE {
                let (report, s) = a
                    .parse::<StatusReport>()
                    .map_field_err("Bundle status report")?;
                return Ok((AdministrativeRecord::StatusReport(report), shortest && s));
            }

            let start = a.offset();
            match a.skip_value(16).map_field_err("Record content")? {
                Some(s) => Ok((
                    AdministrativeRecord::Unknown {
                        record_type,
                        data: data[start..a.offset()].into(),
                    },
                    shortest && s,
                )),
                None => Err(StatusReportError::InvalidField {
                    field: "Record content",
                    source: cbor::decode::Error::NoMoreItems.into(),
                }),
            }
        })
        .map(|o| o.map(|((v, s), len)| (v, s, len)))
    }
}

/// Parses the payload of an administrative record bundle.
impl TryFrom<&Bundle> for AdministrativeRecord {
    type Error = StatusReportError;

    fn try_from(bundle: &Bundle) -> Result<Self, Self::Error> {
        if !bundle.flags().is_admin_record {
            return Err(StatusReportError::NotAdminRecord);
        }
        let (record, _, len) = cbor::decode::parse_detail::<Self>(bundle.payload())?;
        if len != bundle.payload().len() {
            return Err(cbor::decode::Error::AdditionalItems.into());
        }
        Ok(record)
    }
}

/// Builds a bundle carrying a status report about `subject`, sent from
/// `source` to the subject's report-to endpoint.
///
/// The report bundle is an administrative record with a one hour lifetime,
/// and `crc_type` on every block.
pub fn new_status_report_bundle(
    subject: &Bundle,
    source: Eid,
    crc_type: CrcType,
    kind: StatusKind,
    reason: ReasonCode,
) -> Result<Bundle, ValidationError> {
    let record = AdministrativeRecord::StatusReport(StatusReport::new(
        subject,
        kind,
        reason,
        DtnTime::now(),
    ));

    debug!(
        "Creating {kind:?} status report for bundle {} to {}",
        subject.id(),
        subject.report_to()
    );

    Builder::new()
        .flags(BundleFlags {
            is_admin_record: true,
            ..Default::default()
        })
        .crc_type(crc_type)
        .source(source.clone())
        .report_to(source)
        .destination(subject.report_to().clone())
        .lifetime(STATUS_REPORT_LIFETIME)
        .add_payload_block(&cbor::encode::emit(&record))
        .build()
}
