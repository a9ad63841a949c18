/*!
Bundle Protocol version 7 (RFC 9171) data model and CBOR codec.

Bundles are built with [`prelude::Builder`] or decoded with [`codec::decode`],
validated on construction, and serialized with [`codec::encode`].
*/

use dtnbp_cbor as cbor;
use prelude::*;
use tracing::{debug, trace};

mod block;
mod block_flags;
mod block_type;
mod builder;
mod bundle;
mod bundle_flags;
mod creation_timestamp;
mod dtn_time;
mod hop_info;
mod metadata;
mod primary_block;

pub mod bundle_id;
pub mod codec;
pub mod config;
pub mod crc;
pub mod eid;
pub mod error;
pub mod status_report;

#[cfg(feature = "sample")]
pub mod sample;

pub mod prelude {
    pub use super::block::{Block, CanonicalBlock};
    pub use super::block_flags::BlockFlags;
    pub use super::block_type::BlockType;
    pub use super::builder::{BlockBuilder, Builder};
    pub use super::bundle::Bundle;
    pub use super::bundle_flags::BundleFlags;
    pub use super::bundle_id::{BundleId, FragmentInfo};
    pub use super::config::Config;
    pub use super::crc::CrcType;
    pub use super::creation_timestamp::CreationTimestamp;
    pub use super::dtn_time::DtnTime;
    pub use super::eid::Eid;
    pub use super::error::{DecodeError, ValidationError};
    pub use super::hop_info::HopInfo;
    pub use super::metadata::Metadata;
    pub use super::primary_block::PrimaryBlock;
    pub use super::status_report::{
        AdministrativeRecord, ReasonCode, Status, StatusKind, StatusReport,
    };
}
