//! REST resource paths and name lookups
//!
//! Paths are relative to the API root (`https://<cluster>/api`).

use crate::domain::ports::{Method, RemoteClient};
use crate::error::{Error, Result};
use serde_json::Value;

pub const EXPORT_POLICIES: &str = "/protocols/nfs/export-policies";
pub const VOLUMES: &str = "/storage/volumes";
pub const JOBS: &str = "/cluster/jobs";

pub fn export_policy(policy_id: u64) -> String {
    format!("{}/{}", EXPORT_POLICIES, policy_id)
}

pub fn export_rules(policy_id: u64) -> String {
    format!("{}/{}/rules", EXPORT_POLICIES, policy_id)
}

pub fn export_rule(policy_id: u64, index: u32) -> String {
    format!("{}/{}/rules/{}", EXPORT_POLICIES, policy_id, index)
}

pub fn volume(uuid: &str) -> String {
    format!("{}/{}", VOLUMES, urlencoding::encode(uuid))
}

pub fn job(uuid: &str) -> String {
    format!("{}/{}", JOBS, urlencoding::encode(uuid))
}

/// Collection path filtered by name, optionally requesting extra fields
pub fn by_name(collection: &str, name: &str, fields: Option<&str>) -> String {
    let mut path = format!("{}?name={}", collection, urlencoding::encode(name));
    if let Some(fields) = fields {
        path.push_str("&fields=");
        path.push_str(&urlencoding::encode(fields));
    }
    path
}

/// Locate a named resource within a tenant.
///
/// Returns the first matching record, or `None` when the collection has no
/// record with that name.
pub async fn find_by_name(
    client: &dyn RemoteClient,
    tenant: &str,
    collection: &str,
    name: &str,
    fields: Option<&str>,
) -> Result<Option<Value>> {
    let resp = client
        .send(Method::GET, &by_name(collection, name, fields), tenant, None)
        .await?;

    if !resp.is_success() {
        return Err(Error::RemoteOperationFailed {
            operation: "lookup".into(),
            resource: format!("{}?name={}", collection, name),
            status: resp.status,
            message: resp.error_message(),
        });
    }

    Ok(resp.records().first().cloned())
}
