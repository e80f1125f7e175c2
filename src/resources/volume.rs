//! Schema pieces and converters shared by the volume resources and data
//! sources.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::api::{
    Constraint, CsiMountOptions, CsiTopology, CsiTopologyRequest, CsiVolume, VolumeCapability,
};
use crate::error::ProviderError;
use crate::helper::{humanize_bytes, parse_bytes};
use crate::schema::{
    Attribute, AttributeFlags, AttributeType, Block, NestedBlock, ValueValidator,
};

/// Access modes of CSI volumes.
pub const CSI_ACCESS_MODES: [&str; 5] = [
    "single-node-reader-only",
    "single-node-writer",
    "multi-node-reader-only",
    "multi-node-single-writer",
    "multi-node-multi-writer",
];

/// Access modes of dynamic host volumes.
pub const HOST_ACCESS_MODES: [&str; 4] = [
    "single-node-reader-only",
    "single-node-writer",
    "single-node-single-writer",
    "single-node-multi-writer",
];

pub const ATTACHMENT_MODES: [&str; 2] = ["block-device", "file-system"];

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityState {
    pub access_mode: String,
    pub attachment_mode: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountOptionsState {
    pub fs_type: String,
    pub mount_flags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyState {
    pub segments: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyListState {
    pub topology: Vec<TopologyState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyRequestState {
    pub required: Option<TopologyListState>,
    pub preferred: Option<TopologyListState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintState {
    pub attribute: String,
    pub operator: String,
    pub value: String,
}

impl Default for ConstraintState {
    fn default() -> Self {
        Self {
            attribute: String::new(),
            operator: "=".to_string(),
            value: String::new(),
        }
    }
}

/// Health and placement fields Nomad reports for a CSI volume.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsiVolumeStatus {
    pub controller_required: bool,
    pub controllers_expected: i64,
    pub controllers_healthy: i64,
    pub plugin_provider: String,
    pub plugin_provider_version: String,
    pub nodes_healthy: i64,
    pub nodes_expected: i64,
    pub schedulable: bool,
    pub topologies: Vec<TopologyState>,
}

impl CsiVolumeStatus {
    pub fn from_volume(volume: &CsiVolume) -> Self {
        Self {
            controller_required: volume.controller_required,
            controllers_expected: volume.controllers_expected,
            controllers_healthy: volume.controllers_healthy,
            plugin_provider: volume.provider.clone(),
            plugin_provider_version: volume.provider_version.clone(),
            nodes_healthy: volume.nodes_healthy,
            nodes_expected: volume.nodes_expected,
            schedulable: volume.schedulable,
            topologies: flatten_topologies(&volume.topologies),
        }
    }

    /// Computed attributes for the fields above.
    pub fn attributes() -> Vec<(&'static str, Attribute)> {
        vec![
            ("controller_required", Attribute::computed_bool()),
            ("controllers_expected", Attribute::computed_int64()),
            ("controllers_healthy", Attribute::computed_int64()),
            ("plugin_provider", Attribute::computed_string()),
            ("plugin_provider_version", Attribute::computed_string()),
            ("nodes_healthy", Attribute::computed_int64()),
            ("nodes_expected", Attribute::computed_int64()),
            ("schedulable", Attribute::computed_bool()),
            ("topologies", topologies_attribute()),
        ]
    }
}

pub fn topologies_attribute() -> Attribute {
    Attribute::new(
        AttributeType::list(AttributeType::object([(
            "segments",
            AttributeType::map(AttributeType::String),
        )])),
        AttributeFlags::computed(),
    )
}

/// A `capability` set block with the given access modes.
pub fn capability_block(access_modes: &[&str]) -> NestedBlock {
    NestedBlock::set(
        Block::new()
            .with_attribute(
                "access_mode",
                Attribute::required_string().one_of(access_modes.iter().copied()),
            )
            .with_attribute(
                "attachment_mode",
                Attribute::required_string().one_of(ATTACHMENT_MODES),
            ),
    )
    .with_min_items(1)
}

pub fn mount_options_block() -> NestedBlock {
    NestedBlock::single(
        Block::new()
            .with_attribute("fs_type", Attribute::optional_string())
            .with_attribute(
                "mount_flags",
                Attribute::string_list(AttributeFlags::optional().sensitive()),
            ),
    )
}

pub fn topology_request_block() -> NestedBlock {
    let topologies = || {
        NestedBlock::single(Block::new().with_block(
            "topology",
            NestedBlock::list(Block::new().with_attribute(
                "segments",
                Attribute::string_map(AttributeFlags::required()),
            )),
        ))
    };
    NestedBlock::single(
        Block::new()
            .with_block("required", topologies())
            .with_block("preferred", topologies()),
    )
}

pub fn constraint_block() -> NestedBlock {
    NestedBlock::list(
        Block::new()
            .with_attribute("attribute", Attribute::required_string())
            .with_attribute("operator", Attribute::optional_string().with_default("="))
            .with_attribute("value", Attribute::optional_string()),
    )
}

/// An optional byte-size attribute such as `capacity_min`.
pub fn capacity_attribute() -> Attribute {
    Attribute::optional_string().with_validator(ValueValidator::ByteSize)
}

pub fn expand_capabilities(capabilities: &[CapabilityState]) -> Vec<VolumeCapability> {
    capabilities
        .iter()
        .map(|c| VolumeCapability {
            access_mode: c.access_mode.clone(),
            attachment_mode: c.attachment_mode.clone(),
        })
        .collect()
}

pub fn flatten_capabilities(capabilities: &[VolumeCapability]) -> Vec<CapabilityState> {
    let mut out: Vec<_> = capabilities
        .iter()
        .map(|c| CapabilityState {
            access_mode: c.access_mode.clone(),
            attachment_mode: c.attachment_mode.clone(),
        })
        .collect();
    out.sort();
    out
}

pub fn expand_mount_options(options: Option<&MountOptionsState>) -> Option<CsiMountOptions> {
    options.map(|o| CsiMountOptions {
        fs_type: o.fs_type.clone(),
        mount_flags: o.mount_flags.clone(),
    })
}

/// Nomad redacts mount flags, so the configured ones are kept.
pub fn flatten_mount_options(
    options: Option<&CsiMountOptions>,
    prior: Option<&MountOptionsState>,
) -> Option<MountOptionsState> {
    options.map(|o| MountOptionsState {
        fs_type: o.fs_type.clone(),
        mount_flags: prior.map(|p| p.mount_flags.clone()).unwrap_or_default(),
    })
}

fn expand_topologies(list: Option<&TopologyListState>) -> Vec<CsiTopology> {
    list.map(|l| {
        l.topology
            .iter()
            .map(|t| CsiTopology {
                segments: t.segments.clone(),
            })
            .collect()
    })
    .unwrap_or_default()
}

pub fn flatten_topologies(topologies: &[CsiTopology]) -> Vec<TopologyState> {
    topologies
        .iter()
        .map(|t| TopologyState {
            segments: t.segments.clone(),
        })
        .collect()
}

fn flatten_topology_list(topologies: &[CsiTopology]) -> Option<TopologyListState> {
    if topologies.is_empty() {
        None
    } else {
        Some(TopologyListState {
            topology: flatten_topologies(topologies),
        })
    }
}

pub fn expand_topology_request(request: Option<&TopologyRequestState>) -> Option<CsiTopologyRequest> {
    request.map(|r| CsiTopologyRequest {
        required: expand_topologies(r.required.as_ref()),
        preferred: expand_topologies(r.preferred.as_ref()),
    })
}

pub fn flatten_topology_request(request: Option<&CsiTopologyRequest>) -> Option<TopologyRequestState> {
    request
        .filter(|r| !r.required.is_empty() || !r.preferred.is_empty())
        .map(|r| TopologyRequestState {
            required: flatten_topology_list(&r.required),
            preferred: flatten_topology_list(&r.preferred),
        })
}

pub fn expand_constraints(constraints: &[ConstraintState]) -> Vec<Constraint> {
    constraints
        .iter()
        .map(|c| Constraint {
            l_target: c.attribute.clone(),
            r_target: c.value.clone(),
            operand: c.operator.clone(),
        })
        .collect()
}

pub fn flatten_constraints(constraints: &[Constraint]) -> Vec<ConstraintState> {
    constraints
        .iter()
        .map(|c| ConstraintState {
            attribute: c.l_target.clone(),
            operator: c.operand.clone(),
            value: c.r_target.clone(),
        })
        .collect()
}

/// Parse a configured capacity; empty means unset (0).
pub fn parse_capacity(attribute: &str, value: &str) -> Result<i64, ProviderError> {
    if value.is_empty() {
        return Ok(0);
    }
    let bytes = parse_bytes(value)
        .map_err(|e| ProviderError::Validation(format!("invalid {}: {}", attribute, e)))?;
    i64::try_from(bytes)
        .map_err(|_| ProviderError::Validation(format!("{} {:?} is too large", attribute, value)))
}

/// Format a capacity for state, keeping the configured spelling when it
/// denotes the same number of bytes.
pub fn flatten_capacity(bytes: i64, prior: &str) -> String {
    if bytes <= 0 {
        return String::new();
    }
    match parse_bytes(prior) {
        Ok(parsed) if parsed == bytes as u64 => prior.to_string(),
        _ => humanize_bytes(bytes as u64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(10_737_418_240, "10GiB", "10GiB")]
    #[case(10_737_418_240, "", "10 GiB")]
    #[case(10_737_418_240, "5GiB", "10 GiB")]
    #[case(0, "", "")]
    fn test_flatten_capacity(#[case] bytes: i64, #[case] prior: &str, #[case] expected: &str) {
        assert_eq!(flatten_capacity(bytes, prior), expected);
    }

    #[test]
    fn test_parse_capacity() {
        assert_eq!(parse_capacity("capacity_min", "10GiB").unwrap(), 10_737_418_240);
        assert_eq!(parse_capacity("capacity_min", "").unwrap(), 0);
        assert!(parse_capacity("capacity_min", "lots").is_err());
    }

    #[test]
    fn test_mount_flags_are_kept_from_prior() {
        let prior = MountOptionsState {
            fs_type: "ext4".into(),
            mount_flags: vec!["noatime".into()],
        };
        let returned = CsiMountOptions {
            fs_type: "ext4".into(),
            mount_flags: vec![],
        };
        assert_eq!(
            flatten_mount_options(Some(&returned), Some(&prior)),
            Some(prior)
        );
    }

    #[test]
    fn test_topology_request_round_trip() {
        let request = TopologyRequestState {
            required: Some(TopologyListState {
                topology: vec![TopologyState {
                    segments: HashMap::from([("rack".to_string(), "R1".to_string())]),
                }],
            }),
            preferred: None,
        };
        let expanded = expand_topology_request(Some(&request));
        assert_eq!(flatten_topology_request(expanded.as_ref()), Some(request));
        assert_eq!(
            flatten_topology_request(Some(&CsiTopologyRequest::default())),
            None
        );
    }

    #[test]
    fn test_capabilities_sorted() {
        let caps = flatten_capabilities(&[
            VolumeCapability {
                access_mode: "single-node-writer".into(),
                attachment_mode: "file-system".into(),
            },
            VolumeCapability {
                access_mode: "multi-node-reader-only".into(),
                attachment_mode: "file-system".into(),
            },
        ]);
        assert_eq!(caps[0].access_mode, "multi-node-reader-only");
    }
}
