//! Wire types for the ONTAP resources the workflow reads and writes

use crate::domain::model::JobState;
use serde::{Deserialize, Serialize};

/// Guarantee type for thick provisioning
pub const GUARANTEE_THICK: &str = "volume";
/// NAS security style for new volumes
pub const SECURITY_STYLE_UNIX: &str = "unix";
/// Snapshot policy that disables scheduled snapshots
pub const SNAPSHOT_POLICY_NONE: &str = "none";
/// Efficiency mode that disables a feature
pub const EFFICIENCY_NONE: &str = "none";
/// Volume state the online wait is looking for
pub const VOLUME_ONLINE: &str = "online";

// =============================================================================
// Export Policies and Rules
// =============================================================================

/// Export policy collection record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportPolicyRecord {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: String,
}

/// One entry of a rule's client list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMatch {
    #[serde(rename = "match")]
    pub pattern: String,
}

impl ClientMatch {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }
}

/// Export rule, as listed and as submitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    #[serde(default)]
    pub clients: Vec<ClientMatch>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ro_rule: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rw_rule: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub superuser: Vec<String>,
}

impl ExportRule {
    /// NFS rule granting `any` access to a single client
    pub fn nfs_any(client: &str) -> Self {
        let any = vec!["any".to_string()];
        Self {
            index: None,
            clients: vec![ClientMatch::new(client)],
            protocols: vec!["nfs".to_string()],
            ro_rule: any.clone(),
            rw_rule: any.clone(),
            superuser: any,
        }
    }

    /// Match string of the rule's first client
    pub fn first_match(&self) -> Option<&str> {
        self.clients.first().map(|c| c.pattern.as_str())
    }

    pub fn covers(&self, client: &str) -> bool {
        self.clients.iter().any(|c| c.pattern == client)
    }
}

// =============================================================================
// Volumes
// =============================================================================

/// Volume record as returned by lookups and GETs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeRecord {
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

/// Reference to a resource by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub name: String,
}

impl NamedRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Reference to a resource by numeric id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRef {
    pub id: u64,
}

/// Space guarantee
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guarantee {
    #[serde(rename = "type")]
    pub kind: String,
}

/// NAS settings of a new volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NasSettings {
    pub path: String,
    pub export_policy: IdRef,
    pub security_style: String,
}

/// Body of `POST /storage/volumes`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeCreateRequest {
    pub name: String,
    pub aggregates: Vec<NamedRef>,
    pub size: u64,
    pub guarantee: Guarantee,
    pub nas: NasSettings,
}

impl VolumeCreateRequest {
    /// Thick-provisioned NFS volume exported at `/<name>`
    pub fn thick_nfs(name: &str, aggregate: &str, size_bytes: u64, policy_id: u64) -> Self {
        Self {
            name: name.to_string(),
            aggregates: vec![NamedRef::new(aggregate)],
            size: size_bytes,
            guarantee: Guarantee {
                kind: GUARANTEE_THICK.to_string(),
            },
            nas: NasSettings {
                path: format!("/{}", name),
                export_policy: IdRef { id: policy_id },
                security_style: SECURITY_STYLE_UNIX.to_string(),
            },
        }
    }
}

/// Body of the snapshot policy PATCH
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotPolicyPatch {
    pub snapshot_policy: NamedRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSpace {
    pub reserve_percent: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceSettings {
    pub snapshot: SnapshotSpace,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EfficiencySettings {
    pub dedupe: String,
    pub cross_volume_dedupe: String,
    pub compression: String,
}

/// Body of the final settings PATCH
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalSettingsPatch {
    pub space: SpaceSettings,
    pub snapshot_directory_access_enabled: bool,
    pub efficiency: EfficiencySettings,
}

impl FinalSettingsPatch {
    /// No snapshot reserve, hidden `.snapshot` directory, efficiency off
    pub fn lean() -> Self {
        Self {
            space: SpaceSettings {
                snapshot: SnapshotSpace { reserve_percent: 0 },
            },
            snapshot_directory_access_enabled: false,
            efficiency: EfficiencySettings {
                dedupe: EFFICIENCY_NONE.to_string(),
                cross_volume_dedupe: EFFICIENCY_NONE.to_string(),
                compression: EFFICIENCY_NONE.to_string(),
            },
        }
    }
}

// =============================================================================
// Jobs
// =============================================================================

/// Background job record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl JobRecord {
    pub fn job_state(&self) -> JobState {
        self.state
            .as_deref()
            .map(JobState::parse)
            .unwrap_or(JobState::Unknown)
    }
}
