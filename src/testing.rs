//! In-memory cluster for tests
//!
//! Implements the remote client port over a scripted model of the export
//! policy, rule, volume and job resources, and records every request.

use crate::domain::ports::{Method, RemoteClient, RemoteResponse};
use crate::error::{Error, Result};
use crate::ontap::resources::{ClientMatch, ExportRule};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet, VecDeque};
use parking_lot::Mutex;
use std::sync::Arc;

/// A request as the cluster saw it
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub tenant: String,
    pub body: Option<Value>,
}

struct FakePolicy {
    name: String,
    rules: BTreeMap<u32, ExportRule>,
    next_index: u32,
}

struct FakeVolume {
    name: String,
    doc: Value,
    states: VecDeque<String>,
}

#[derive(Default)]
struct ClusterState {
    next_id: u64,
    policies: BTreeMap<u64, FakePolicy>,
    volumes: BTreeMap<String, FakeVolume>,
    jobs: BTreeMap<String, VecDeque<String>>,
    requests: Vec<RecordedRequest>,

    job_script: Option<Vec<String>>,
    volume_states: Vec<String>,
    failing_rule_ips: HashSet<String>,
    failing_patch_keys: HashSet<String>,
    policy_create_status: Option<u16>,
    volume_create_status: Option<u16>,
    hide_volumes: bool,
    unreachable: bool,
    reachable_requests: Option<usize>,
}

impl ClusterState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn start_job(&mut self) -> Option<String> {
        let script = self.job_script.clone()?;
        let uuid = format!("job-{}", self.next_id());
        self.jobs.insert(uuid.clone(), script.into());
        Some(uuid)
    }
}

/// Scripted in-memory cluster
#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<ClusterState>,
}

fn error_body(message: &str) -> Value {
    json!({"error": {"message": message, "code": "0"}})
}

fn respond(status: u16, body: Value) -> Result<RemoteResponse> {
    Ok(RemoteResponse::new(status, body))
}

fn merge(target: &mut Value, patch: &Value) {
    let Value::Object(fields) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = json!({});
    }
    if let Value::Object(map) = target {
        for (key, value) in fields {
            merge(map.entry(key.clone()).or_insert(Value::Null), value);
        }
    }
}

impl FakeCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    // =========================================================================
    // Scripting
    // =========================================================================

    /// Seed an export policy with one rule per client
    pub fn with_policy(&self, name: &str, clients: &[&str]) -> u64 {
        let mut state = self.state.lock();
        let id = state.next_id();
        let mut policy = FakePolicy {
            name: name.to_string(),
            rules: BTreeMap::new(),
            next_index: 1,
        };
        for client in clients {
            let mut rule = ExportRule::nfs_any(client);
            rule.index = Some(policy.next_index);
            policy.rules.insert(policy.next_index, rule);
            policy.next_index += 1;
        }
        state.policies.insert(id, policy);
        id
    }

    /// Add a rule with several clients to an existing policy
    pub fn with_rule(&self, policy_id: u64, clients: &[&str]) -> u32 {
        let mut state = self.state.lock();
        let policy = state.policies.get_mut(&policy_id).expect("policy");
        let index = policy.next_index;
        policy.next_index += 1;
        let mut rule = ExportRule::nfs_any(clients[0]);
        rule.clients = clients.iter().map(|c| ClientMatch::new(*c)).collect();
        rule.index = Some(index);
        policy.rules.insert(index, rule);
        index
    }

    /// Seed an online volume
    pub fn with_volume(&self, name: &str, size: u64) -> String {
        let mut state = self.state.lock();
        let uuid = format!("vol-{}", state.next_id());
        let doc = json!({"uuid": uuid, "name": name, "size": size, "state": "online"});
        state.volumes.insert(
            uuid.clone(),
            FakeVolume {
                name: name.to_string(),
                doc,
                states: VecDeque::new(),
            },
        );
        uuid
    }

    /// Volume mutations answer 202 with a job walking through `states`
    pub fn async_jobs(&self, states: &[&str]) {
        self.state.lock().job_script =
            Some(states.iter().map(|s| s.to_string()).collect());
    }

    /// New volumes report these states before `online`
    pub fn volume_states(&self, states: &[&str]) {
        self.state.lock().volume_states = states.iter().map(|s| s.to_string()).collect();
    }

    pub fn fail_rule_for(&self, ip: &str) {
        self.state.lock().failing_rule_ips.insert(ip.to_string());
    }

    /// Reject volume PATCHes whose body carries `key`
    pub fn fail_patch(&self, key: &str) {
        self.state.lock().failing_patch_keys.insert(key.to_string());
    }

    pub fn fail_policy_create(&self, status: u16) {
        self.state.lock().policy_create_status = Some(status);
    }

    pub fn fail_volume_create(&self, status: u16) {
        self.state.lock().volume_create_status = Some(status);
    }

    /// Volume lookups by name find nothing
    pub fn hide_volumes(&self) {
        self.state.lock().hide_volumes = true;
    }

    /// Every request fails at the transport level
    pub fn unreachable(&self) {
        self.state.lock().unreachable = true;
    }

    /// Answer the next `count` requests, then fail at the transport level
    pub fn drop_connection_after(&self, count: usize) {
        self.state.lock().reachable_requests = Some(count);
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    /// Requests that change cluster state
    pub fn mutations(&self) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method != Method::GET)
            .collect()
    }

    pub fn count(&self, method: Method, path_prefix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path.starts_with(path_prefix))
            .count()
    }

    pub fn policy_id(&self, name: &str) -> Option<u64> {
        let state = self.state.lock();
        state
            .policies
            .iter()
            .find(|(_, p)| p.name == name)
            .map(|(id, _)| *id)
    }

    /// Client lists of a policy's rules, in index order
    pub fn policy_rules(&self, name: &str) -> Vec<Vec<String>> {
        let state = self.state.lock();
        state
            .policies
            .values()
            .find(|p| p.name == name)
            .map(|p| {
                p.rules
                    .values()
                    .map(|r| r.clients.iter().map(|c| c.pattern.clone()).collect())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Current document of a volume, create body merged with all patches
    pub fn volume(&self, name: &str) -> Option<Value> {
        let state = self.state.lock();
        state
            .volumes
            .values()
            .find(|v| v.name == name)
            .map(|v| v.doc.clone())
    }

    // =========================================================================
    // Routing
    // =========================================================================

    fn route(
        state: &mut ClusterState,
        method: &Method,
        path: &str,
        query: &BTreeMap<String, String>,
        body: Option<&Value>,
    ) -> Result<RemoteResponse> {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

        match (method.as_str(), segments.as_slice()) {
            ("POST", ["protocols", "nfs", "export-policies"]) => {
                if let Some(status) = state.policy_create_status {
                    return respond(status, error_body("export policy create rejected"));
                }
                let name = body
                    .and_then(|b| b.get("name"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                if state.policies.values().any(|p| p.name == name) {
                    return respond(409, error_body("Duplicate export policy name"));
                }
                let id = state.next_id();
                state.policies.insert(
                    id,
                    FakePolicy {
                        name,
                        rules: BTreeMap::new(),
                        next_index: 1,
                    },
                );
                respond(201, json!({"num_records": 1}))
            }
            ("GET", ["protocols", "nfs", "export-policies"]) => {
                let records: Vec<Value> = state
                    .policies
                    .iter()
                    .filter(|(_, p)| query.get("name").map_or(true, |n| *n == p.name))
                    .map(|(id, p)| json!({"id": id, "name": p.name}))
                    .collect();
                respond(200, json!({"records": records, "num_records": records.len()}))
            }
            ("DELETE", ["protocols", "nfs", "export-policies", id]) => {
                let id: u64 = id.parse().unwrap_or_default();
                let in_use = state
                    .volumes
                    .values()
                    .any(|v| v.doc.pointer("/nas/export_policy/id") == Some(&json!(id)));
                if in_use {
                    return respond(400, error_body("export policy is in use by a volume"));
                }
                match state.policies.remove(&id) {
                    Some(_) => respond(200, json!({})),
                    None => respond(404, error_body("entry doesn't exist")),
                }
            }
            (_, ["protocols", "nfs", "export-policies", id, "rules", rest @ ..]) => {
                let id: u64 = id.parse().unwrap_or_default();
                let failing = state.failing_rule_ips.clone();
                let Some(policy) = state.policies.get_mut(&id) else {
                    return respond(404, error_body("export policy not found"));
                };
                Self::route_rules(policy, &failing, method, rest, body)
            }
            ("POST", ["storage", "volumes"]) => {
                if let Some(status) = state.volume_create_status {
                    return respond(status, error_body("volume create rejected"));
                }
                let body = body.cloned().unwrap_or(Value::Null);
                let name = body["name"].as_str().unwrap_or_default().to_string();
                if state.volumes.values().any(|v| v.name == name) {
                    return respond(409, error_body("Duplicate volume name"));
                }
                let uuid = format!("vol-{}", state.next_id());
                let mut doc = body;
                merge(&mut doc, &json!({"uuid": uuid, "state": "online"}));
                let states = state.volume_states.clone().into();
                state
                    .volumes
                    .insert(uuid, FakeVolume { name, doc, states });
                match state.start_job() {
                    Some(job) => respond(202, json!({"job": {"uuid": job}})),
                    None => respond(201, json!({"num_records": 1})),
                }
            }
            ("GET", ["storage", "volumes"]) => {
                if state.hide_volumes {
                    return respond(200, json!({"records": [], "num_records": 0}));
                }
                let records: Vec<Value> = state
                    .volumes
                    .values()
                    .filter(|v| query.get("name").map_or(true, |n| *n == v.name))
                    .map(|v| json!({"uuid": v.doc["uuid"], "name": v.name, "size": v.doc["size"]}))
                    .collect();
                respond(200, json!({"records": records, "num_records": records.len()}))
            }
            ("GET", ["storage", "volumes", uuid]) => match state.volumes.get_mut(*uuid) {
                Some(volume) => {
                    let mut doc = volume.doc.clone();
                    if let Some(current) = volume.states.pop_front() {
                        doc["state"] = json!(current);
                    }
                    respond(200, doc)
                }
                None => respond(404, error_body("volume not found")),
            },
            ("PATCH", ["storage", "volumes", uuid]) => {
                let body = body.cloned().unwrap_or(Value::Null);
                let rejected = body
                    .as_object()
                    .map_or(false, |o| o.keys().any(|k| state.failing_patch_keys.contains(k)));
                if rejected {
                    return respond(400, error_body("field cannot be modified"));
                }
                let Some(volume) = state.volumes.get_mut(*uuid) else {
                    return respond(404, error_body("volume not found"));
                };
                merge(&mut volume.doc, &body);
                match body.get("size").and_then(|_| state.start_job()) {
                    Some(job) => respond(202, json!({"job": {"uuid": job}})),
                    None => respond(200, json!({})),
                }
            }
            ("DELETE", ["storage", "volumes", uuid]) => {
                if state.volumes.remove(*uuid).is_none() {
                    return respond(404, error_body("volume not found"));
                }
                match state.start_job() {
                    Some(job) => respond(202, json!({"job": {"uuid": job}})),
                    None => respond(200, json!({})),
                }
            }
            ("GET", ["cluster", "jobs", uuid]) => match state.jobs.get_mut(*uuid) {
                Some(states) => {
                    let current = if states.len() > 1 {
                        states.pop_front().unwrap_or_default()
                    } else {
                        states.front().cloned().unwrap_or_default()
                    };
                    let message = if current == "failure" {
                        "Insufficient space in aggregate"
                    } else {
                        "Job in progress"
                    };
                    respond(200, json!({"uuid": uuid, "state": current, "message": message}))
                }
                None => respond(404, error_body("job not found")),
            },
            _ => respond(404, error_body("no such API endpoint")),
        }
    }

    fn route_rules(
        policy: &mut FakePolicy,
        failing: &HashSet<String>,
        method: &Method,
        rest: &[&str],
        body: Option<&Value>,
    ) -> Result<RemoteResponse> {
        match (method.as_str(), rest) {
            ("GET", []) => {
                let records: Vec<Value> = policy
                    .rules
                    .values()
                    .map(|r| serde_json::to_value(r).unwrap_or(Value::Null))
                    .collect();
                respond(200, json!({"records": records, "num_records": records.len()}))
            }
            ("POST", []) => {
                let mut rule: ExportRule =
                    serde_json::from_value(body.cloned().unwrap_or(Value::Null))?;
                if rule.first_match().map_or(false, |ip| failing.contains(ip)) {
                    return respond(400, error_body("invalid client match"));
                }
                let index = policy.next_index;
                policy.next_index += 1;
                rule.index = Some(index);
                policy.rules.insert(index, rule);
                respond(201, json!({"num_records": 1}))
            }
            (method, [index]) => {
                let index: u32 = index.parse().unwrap_or_default();
                match method {
                    "GET" => match policy.rules.get(&index) {
                        Some(rule) => respond(200, serde_json::to_value(rule)?),
                        None => respond(404, error_body("rule not found")),
                    },
                    "PATCH" => match policy.rules.get_mut(&index) {
                        Some(rule) => {
                            let clients = body
                                .and_then(|b| b.get("clients"))
                                .cloned()
                                .unwrap_or(Value::Null);
                            rule.clients = serde_json::from_value(clients)?;
                            respond(200, json!({}))
                        }
                        None => respond(404, error_body("rule not found")),
                    },
                    "DELETE" => match policy.rules.remove(&index) {
                        Some(_) => respond(200, json!({})),
                        None => respond(404, error_body("rule not found")),
                    },
                    _ => respond(405, error_body("method not allowed")),
                }
            }
            _ => respond(404, error_body("no such API endpoint")),
        }
    }
}

#[async_trait]
impl RemoteClient for FakeCluster {
    async fn send(
        &self,
        method: Method,
        path: &str,
        tenant: &str,
        body: Option<&Value>,
    ) -> Result<RemoteResponse> {
        let mut state = self.state.lock();
        state.requests.push(RecordedRequest {
            method: method.clone(),
            path: path.to_string(),
            tenant: tenant.to_string(),
            body: body.cloned(),
        });

        let dropped = state
            .reachable_requests
            .map_or(false, |count| state.requests.len() > count);
        if state.unreachable || dropped {
            return Err(Error::Transport {
                method: method.to_string(),
                path: path.to_string(),
                reason: "connection refused".into(),
            });
        }

        let (resource, raw_query) = path.split_once('?').unwrap_or((path, ""));
        let query: BTreeMap<String, String> = raw_query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| {
                let v = urlencoding::decode(v).map(|v| v.into_owned()).unwrap_or_default();
                (k.to_string(), v)
            })
            .collect();

        Self::route(&mut state, &method, resource, &query, body)
    }

    fn endpoint(&self) -> &str {
        "fake://cluster"
    }
}
