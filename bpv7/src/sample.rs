/*!
Random sample bundles, for tests and demonstrations.
*/

use super::*;
use rand::{Rng, seq::IndexedRandom};

const SINGLETONS: [&str; 5] = ["sms", "files", "123456", "incoming", "mavlink"];
const GROUPS: [&str; 3] = ["~news", "~tele", "~mavlink"];

fn rnd_node(rng: &mut impl Rng, services: &[&str]) -> Eid {
    Eid::Dtn {
        node_name: format!("node{}", rng.random_range(1..99u32)).into(),
        demux: services.choose(rng).copied().unwrap_or_default().into(),
    }
}

/// A bundle from a random `dtn` node and service to a random node and
/// service or group, carrying the payload `ABC`.
///
/// Every block has a CRC-32C, and there is a Hop Count block with a limit of
/// 32.
pub fn rnd_bundle(timestamp: CreationTimestamp) -> Result<Bundle, ValidationError> {
    let mut rng = rand::rng();
    let destinations = [&SINGLETONS[..], &GROUPS[..]].concat();

    Builder::with_config(&Config {
        crc_type: CrcType::CRC32_CASTAGNOLI,
        lifetime: 60 * 60 * 1000,
        hop_limit: Some(32),
        ..Default::default()
    })
    .source(rnd_node(&mut rng, &SINGLETONS))
    .destination(rnd_node(&mut rng, &destinations))
    .flags(BundleFlags {
        do_not_fragment: true,
        delivery_report_requested: true,
        ..Default::default()
    })
    .timestamp(timestamp)
    .add_payload_block(b"ABC")
    .build()
}
