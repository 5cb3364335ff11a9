//! Directory lookups.
//!
//! Directories back enum-like custom fields whose stored value is a
//! reference to a directory entry. Searches are best effort: any API failure
//! is logged and reported as "not found". Only [`DirectoryResolver::create_entry`]
//! propagates errors.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::client::{PlanfixRequest, SharedApi, with_query};
use super::error::{PlanfixError, PlanfixResult};
use super::types::{MAX_PAGES, PAGE_SIZE, filter_codes};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub key: u64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct RawDirectory {
    id: u64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    fields: Vec<RawDirectoryField>,
}

#[derive(Debug, Deserialize)]
struct RawDirectoryField {
    id: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntry {
    key: u64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    custom_field_data: Vec<RawEntryValue>,
}

#[derive(Debug, Deserialize)]
struct RawEntryValue {
    field: RawDirectoryField,
    #[serde(default)]
    value: Value,
}

impl RawEntry {
    /// Label of the entry: the name field's value, else the first string.
    fn into_entry(self, name_field: Option<u64>) -> Option<DirectoryEntry> {
        let by_field = name_field.and_then(|id| {
            self.custom_field_data
                .iter()
                .find(|v| v.field.id == id)
                .and_then(|v| v.value.as_str())
        });
        let first_text = || {
            self.custom_field_data
                .iter()
                .find_map(|v| v.value.as_str())
        };
        let name = by_field
            .or_else(first_text)
            .map(str::to_string)
            .or_else(|| self.name.clone())?;
        Some(DirectoryEntry {
            key: self.key,
            name,
        })
    }
}

/// Looks up directories and their entries through the Planfix API.
#[derive(Clone)]
pub struct DirectoryResolver {
    api: SharedApi,
    cache_time: u64,
}

impl DirectoryResolver {
    /// `cache_time` applies to directory metadata reads.
    pub fn new(api: SharedApi, cache_time: u64) -> Self {
        Self { api, cache_time }
    }

    /// Find a directory by name, case-insensitively.
    pub async fn search_directory(&self, name: &str) -> Option<Directory> {
        let wanted = normalize(name);
        let mut offset = 0;
        for _ in 0..MAX_PAGES {
            let request = PlanfixRequest::post(
                "directory/list",
                json!({"offset": offset, "pageSize": PAGE_SIZE, "fields": "id,name"}),
            )
            .with_cache(self.cache_time);

            let body = match self.api.request(request).await {
                Ok(body) => body,
                Err(e) => {
                    warn!("[directory] Directory search for {:?} failed: {}", name, e);
                    return None;
                }
            };
            let page: Vec<RawDirectory> = parse_list(&body, "directories")?;
            let count = page.len() as u64;
            if let Some(found) = page.into_iter().find(|d| normalize(&d.name) == wanted) {
                debug!("[directory] Found directory {:?} ({})", found.name, found.id);
                return Some(Directory {
                    id: found.id,
                    name: found.name,
                });
            }
            if count < PAGE_SIZE {
                break;
            }
            offset += PAGE_SIZE;
        }
        None
    }

    /// Id of the field holding entry labels (the directory's first field).
    pub async fn name_field_id(&self, directory_id: u64) -> Option<u64> {
        let path = with_query(&format!("directory/{}", directory_id), &[("fields", "id,name,fields")]);
        let request = PlanfixRequest::get(path).with_cache(self.cache_time);
        match self.api.request(request).await {
            Ok(body) => body
                .get("directory")
                .cloned()
                .and_then(|d| serde_json::from_value::<RawDirectory>(d).ok())
                .and_then(|d| d.fields.first().map(|f| f.id)),
            Err(e) => {
                warn!("[directory] Cannot read fields of directory {}: {}", directory_id, e);
                None
            }
        }
    }

    /// Fast path: entry whose `field_id` value equals `entry_name` exactly.
    pub async fn search_entry_by_exact_name(
        &self,
        directory_id: u64,
        field_id: u64,
        entry_name: &str,
    ) -> Option<u64> {
        let body = json!({
            "offset": 0,
            "pageSize": PAGE_SIZE,
            "fields": format!("key,name,{}", field_id),
            "filters": [{
                "type": filter_codes::DIRECTORY_ENTRY_FIELD,
                "field": field_id,
                "operator": "equal",
                "value": entry_name,
            }],
        });
        let request = PlanfixRequest::post(format!("directory/{}/entry/list", directory_id), body);
        let response = match self.api.request(request).await {
            Ok(body) => body,
            Err(e) => {
                warn!(
                    "[directory] Entry search {:?} in directory {} failed: {}",
                    entry_name, directory_id, e
                );
                return None;
            }
        };
        let entries: Vec<RawEntry> = parse_list(&response, "directoryEntries")?;
        entries
            .into_iter()
            .filter_map(|e| e.into_entry(Some(field_id)))
            .find(|e| e.name == entry_name)
            .map(|e| e.key)
    }

    /// Every entry of a directory, following pagination.
    pub async fn search_all_entries(&self, directory_id: u64) -> Vec<DirectoryEntry> {
        let name_field = self.name_field_id(directory_id).await;
        let fields = match name_field {
            Some(id) => format!("key,name,{}", id),
            None => "key,name".to_string(),
        };

        let mut entries = Vec::new();
        let mut offset = 0;
        for _ in 0..MAX_PAGES {
            let body = json!({"offset": offset, "pageSize": PAGE_SIZE, "fields": fields});
            let request = PlanfixRequest::post(format!("directory/{}/entry/list", directory_id), body);
            let response = match self.api.request(request).await {
                Ok(body) => body,
                Err(e) => {
                    warn!("[directory] Listing directory {} failed: {}", directory_id, e);
                    return Vec::new();
                }
            };
            let Some(page) = parse_list::<RawEntry>(&response, "directoryEntries") else {
                return Vec::new();
            };
            let count = page.len() as u64;
            entries.extend(page.into_iter().filter_map(|e| e.into_entry(name_field)));
            if count < PAGE_SIZE {
                break;
            }
            offset += PAGE_SIZE;
        }
        entries
    }

    /// Create an entry labelled `name` and return its key.
    pub async fn create_entry(
        &self,
        directory_id: u64,
        field_id: u64,
        name: &str,
    ) -> PlanfixResult<u64> {
        let body = json!({
            "customFieldData": [{"field": {"id": field_id}, "value": name}],
        });
        let request = PlanfixRequest::post(format!("directory/{}/entry/", directory_id), body);
        let response = self.api.request(request).await?;
        let key = response
            .get("key")
            .and_then(Value::as_u64)
            .ok_or_else(|| PlanfixError::invalid_response("created entry has no key"))?;
        info!(
            "[directory] Created entry {:?} ({}) in directory {}",
            name, key, directory_id
        );
        Ok(key)
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Case-insensitive, trimmed match against a listing.
pub fn match_entry<'a>(entries: &'a [DirectoryEntry], name: &str) -> Option<&'a DirectoryEntry> {
    let wanted = normalize(name);
    entries.iter().find(|e| normalize(&e.name) == wanted)
}

fn parse_list<T: serde::de::DeserializeOwned>(body: &Value, key: &str) -> Option<Vec<T>> {
    match super::types::list_from(body, key) {
        Ok(items) => Some(items),
        Err(e) => {
            warn!("[directory] Unexpected {} payload: {}", key, e);
            None
        }
    }
}
