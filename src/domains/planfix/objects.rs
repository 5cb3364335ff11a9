//! File-backed cache of Planfix object metadata.
//!
//! Objects (task types) and their custom fields change rarely. The list is
//! kept in a JSON file as `{cachedAt, objects}` and refreshed from the API
//! once it is older than the configured TTL. A failed refresh falls back to
//! the stale snapshot, or to no metadata at all.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::client::{PlanfixRequest, SharedApi};
use super::types::{MAX_PAGES, PAGE_SIZE};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectField {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanfixObject {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: Vec<ObjectField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot {
    cached_at: i64,
    objects: Vec<PlanfixObject>,
}

impl Snapshot {
    fn is_fresh(&self, ttl: Duration) -> bool {
        let age = chrono::Utc::now().timestamp_millis() - self.cached_at;
        age >= 0 && (age as u128) < ttl.as_millis()
    }
}

/// Raw `object/list` entry; fields live inside `customFieldData[].field`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawObject {
    id: u64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    custom_field_data: Vec<RawObjectField>,
}

#[derive(Debug, Deserialize)]
struct RawObjectField {
    field: ObjectField,
}

impl From<RawObject> for PlanfixObject {
    fn from(raw: RawObject) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            fields: raw.custom_field_data.into_iter().map(|f| f.field).collect(),
        }
    }
}

pub struct ObjectsCache {
    api: SharedApi,
    path: PathBuf,
    ttl: Duration,
    state: Mutex<Option<Snapshot>>,
}

impl ObjectsCache {
    pub fn new(api: SharedApi, path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            api,
            path: path.into(),
            ttl,
            state: Mutex::new(None),
        }
    }

    /// Current object list, refreshing when stale.
    pub async fn objects(&self) -> Vec<PlanfixObject> {
        let mut state = self.state.lock().await;

        if let Some(snapshot) = state.as_ref().filter(|s| s.is_fresh(self.ttl)) {
            return snapshot.objects.clone();
        }

        if state.is_none() {
            *state = self.read_file().await;
            if let Some(snapshot) = state.as_ref().filter(|s| s.is_fresh(self.ttl)) {
                debug!("[objects] Using cached metadata from {:?}", self.path);
                return snapshot.objects.clone();
            }
        }

        match self.fetch().await {
            Some(objects) => {
                let snapshot = Snapshot {
                    cached_at: chrono::Utc::now().timestamp_millis(),
                    objects,
                };
                self.write_file(&snapshot).await;
                let objects = snapshot.objects.clone();
                *state = Some(snapshot);
                objects
            }
            None => state
                .as_ref()
                .map(|stale| {
                    warn!("[objects] Using stale metadata");
                    stale.objects.clone()
                })
                .unwrap_or_default(),
        }
    }

    /// Field metadata by id across all objects.
    pub async fn find_field(&self, field_id: u64) -> Option<ObjectField> {
        self.objects()
            .await
            .into_iter()
            .flat_map(|o| o.fields)
            .find(|f| f.id == field_id)
    }

    /// Directory backing a field, if any.
    pub async fn field_directory_id(&self, field_id: u64) -> Option<u64> {
        self.find_field(field_id).await.and_then(|f| f.directory_id)
    }

    async fn fetch(&self) -> Option<Vec<PlanfixObject>> {
        let mut objects = Vec::new();
        let mut offset = 0;
        let mut exhausted = false;
        for _ in 0..MAX_PAGES {
            let request = PlanfixRequest::post(
                "object/list",
                json!({"offset": offset, "pageSize": PAGE_SIZE, "fields": "id,name,customFieldData"}),
            );
            let body = match self.api.request(request).await {
                Ok(body) => body,
                Err(e) => {
                    warn!("[objects] Cannot load object metadata: {}", e);
                    return None;
                }
            };
            let page: Vec<RawObject> = match super::types::list_from(&body, "objects") {
                Ok(page) => page,
                Err(e) => {
                    warn!("[objects] Unexpected object/list payload: {}", e);
                    return None;
                }
            };
            let count = page.len() as u64;
            objects.extend(page.into_iter().map(PlanfixObject::from));
            if count < PAGE_SIZE {
                exhausted = true;
                break;
            }
            offset += PAGE_SIZE;
        }
        if !exhausted {
            warn!(
                "[objects] object/list still paging after {} pages, keeping {} objects",
                MAX_PAGES,
                objects.len()
            );
        }
        info!("[objects] Loaded metadata for {} objects", objects.len());
        Some(objects)
    }

    async fn read_file(&self) -> Option<Snapshot> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("[objects] Cannot read {:?}: {}", self.path, e);
                return None;
            }
        };
        serde_json::from_str(&raw)
            .map_err(|e| warn!("[objects] Ignoring malformed {:?}: {}", self.path, e))
            .ok()
    }

    async fn write_file(&self, snapshot: &Snapshot) {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                warn!("[objects] Cannot create {:?}: {}", parent, e);
                return;
            }
        }
        let raw = match serde_json::to_string_pretty(snapshot) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("[objects] Cannot serialize metadata: {}", e);
                return;
            }
        };
        if let Err(e) = tokio::fs::write(&self.path, raw).await {
            warn!("[objects] Cannot write {:?}: {}", self.path, e);
        }
    }
}
