use super::*;
use portable_atomic::{AtomicU128, Ordering};

// Millisecond of the last timestamp handed out in the high 64 bits, its
// sequence number in the low 64 bits.
static LAST_TIMESTAMP: AtomicU128 = AtomicU128::new(0);

/// Bundle creation timestamp, RFC 9171 Section 4.2.7.
///
/// A creation time of 0 means the source node has no accurate clock.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CreationTimestamp {
    pub creation_time: DtnTime,
    pub sequence_number: u64,
}

fn next_timestamp(last: u128, millisecs: u64) -> u128 {
    if millisecs > (last >> 64) as u64 {
        (millisecs as u128) << 64
    } else {
        // Same millisecond, or the clock stepped backwards
        last.saturating_add(1)
    }
}

impl CreationTimestamp {
    /// A timestamp from the system clock, unique within this process.
    pub fn now() -> Self {
        let millisecs = DtnTime::now().millisecs();
        let last = match LAST_TIMESTAMP.fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
            Some(next_timestamp(last, millisecs))
        }) {
            Ok(last) | Err(last) => last,
        };
        let next = next_timestamp(last, millisecs);
        Self {
            creation_time: DtnTime::new((next >> 64) as u64),
            sequence_number: next as u64,
        }
    }

    pub fn new(creation_time: DtnTime, sequence_number: u64) -> Self {
        Self {
            creation_time,
            sequence_number,
        }
    }

    /// Returns `true` if the source node had no clock.
    pub fn is_clockless(&self) -> bool {
        self.creation_time.millisecs() == 0
    }
}

impl cbor::encode::ToCbor for CreationTimestamp {
    fn to_cbor(&self, encoder: &mut cbor::encode::Encoder) {
        encoder.emit_array(Some(2), |a| {
            a.emit(&self.creation_time);
            a.emit(&self.sequence_number);
        })
    }
}

impl cbor::decode::FromCbor for CreationTimestamp {
    type Error = cbor::decode::Error;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, bool, usize)>, Self::Error> {
        cbor::decode::try_parse_array(data, |a, shortest, tags| {
            let (creation_time, s1) = a.parse::<DtnTime>()?;
            let (sequence_number, s2) = a.parse::<u64>()?;
            Ok::<_, cbor::decode::Error>((
                Self {
                    creation_time,
                    sequence_number,
                },
                shortest && tags.is_empty() && a.is_definite() && s1 && s2,
            ))
        })
        .map(|o| o.map(|((t, s), len)| (t, s, len)))
    }
}
