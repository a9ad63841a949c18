use super::*;

/// A read-only summary of a bundle's primary block, detached from the bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Metadata {
    pub source: Eid,
    pub destination: Eid,
    pub report_to: Eid,
    pub timestamp: CreationTimestamp,
    /// Lifetime in milliseconds.
    pub lifetime: u64,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub fragment_info: Option<FragmentInfo>,
}

impl From<&Bundle> for Metadata {
    fn from(bundle: &Bundle) -> Self {
        Self {
            source: bundle.source().clone(),
            destination: bundle.destination().clone(),
            report_to: bundle.report_to().clone(),
            timestamp: *bundle.creation_timestamp(),
            lifetime: bundle.lifetime(),
            fragment_info: bundle.fragment_info(),
        }
    }
}
