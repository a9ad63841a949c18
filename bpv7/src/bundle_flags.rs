use super::*;

/// Bundle processing control flags, RFC 9171 Section 4.2.3.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BundleFlags {
    pub is_fragment: bool,
    pub is_admin_record: bool,
    pub do_not_fragment: bool,
    pub app_ack_requested: bool,
    pub report_status_time: bool,
    pub receipt_report_requested: bool,
    pub forward_report_requested: bool,
    pub delivery_report_requested: bool,
    pub delete_report_requested: bool,
    pub unrecognised: u64,
}

const KNOWN: u64 = (1 << 0)
    | (1 << 1)
    | (1 << 2)
    | (1 << 5)
    | (1 << 6)
    | (1 << 14)
    | (1 << 16)
    | (1 << 17)
    | (1 << 18);

impl BundleFlags {
    /// Returns `true` if any status report is requested.
    pub fn any_report_requested(&self) -> bool {
        self.receipt_report_requested
            || self.forward_report_requested
            || self.delivery_report_requested
            || self.delete_report_requested
    }
}

impl From<u64> for BundleFlags {
    fn from(value: u64) -> Self {
        Self {
            is_fragment: value & (1 << 0) != 0,
            is_admin_record: value & (1 << 1) != 0,
            do_not_fragment: value & (1 << 2) != 0,
            app_ack_requested: value & (1 << 5) != 0,
            report_status_time: value & (1 << 6) != 0,
            receipt_report_requested: value & (1 << 14) != 0,
            forward_report_requested: value & (1 << 16) != 0,
            delivery_report_requested: value & (1 << 17) != 0,
            delete_report_requested: value & (1 << 18) != 0,
            unrecognised: value & !KNOWN,
        }
    }
}

impl From<BundleFlags> for u64 {
    fn from(value: BundleFlags) -> Self {
        let mut flags = value.unrecognised & !KNOWN;
        if value.is_fragment {
            flags |= 1 << 0;
        }
        if value.is_admin_record {
            flags |= 1 << 1;
        }
        if value.do_not_fragment {
            flags |= 1 << 2;
        }
        if value.app_ack_requested {
            flags |= 1 << 5;
        }
        if value.report_status_time {
            flags |= 1 << 6;
        }
        if value.receipt_report_requested {
            flags |= 1 << 14;
        }
        if value.forward_report_requested {
            flags |= 1 << 16;
        }
        if value.delivery_report_requested {
            flags |= 1 << 17;
        }
        if value.delete_report_requested {
            flags |= 1 << 18;
        }
        flags
    }
}

impl cbor::encode::ToCbor for BundleFlags {
    fn to_cbor(&self, encoder: &mut cbor::encode::Encoder) {
        encoder.emit(&u64::from(*self))
    }
}

impl cbor::decode::FromCbor for BundleFlags {
    type Error = cbor::decode::Error;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, bool, usize)>, Self::Error> {
        Ok(cbor::decode::try_parse::<u64>(data)?
            .map(|(value, shortest, len)| (value.into(), shortest, len)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits() {
        let flags = BundleFlags::from((1u64 << 2) | (1 << 17) | (1 << 3) | (1 << 40));
        assert!(flags.do_not_fragment);
        assert!(flags.delivery_report_requested);
        assert!(!flags.is_fragment);
        assert_eq!(flags.unrecognised, (1 << 3) | (1 << 40));
        assert_eq!(u64::from(flags), (1 << 2) | (1 << 17) | (1 << 3) | (1 << 40));

        assert_eq!(u64::from(BundleFlags::from(0x7_4067u64)), 0x7_4067);
    }
}
