//! Application context shared by every tool.
//!
//! Built once at startup from [`Config`]: loads the custom field
//! configuration, derives the per-collection field schemas and wires the
//! Planfix client behind the request cache.

use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::config::Config;
use crate::domains::custom_fields::{CustomFieldsConfig, FieldSchema};
use crate::domains::planfix::{
    CachingApi, DirectoryResolver, ObjectsCache, PlanfixClient, PlanfixError, RequestCache,
    SharedApi,
    client::Unconfigured,
};

pub struct AppContext {
    pub config: Arc<Config>,
    pub fields: Arc<CustomFieldsConfig>,
    pub lead_task_schema: FieldSchema,
    pub contact_schema: FieldSchema,
    /// Planfix API, already wrapped by the request cache.
    pub api: SharedApi,
    pub cache: RequestCache,
    pub directories: DirectoryResolver,
    pub objects: Arc<ObjectsCache>,
}

impl AppContext {
    /// Build the production context: real HTTP client and configured cache.
    pub fn from_config(config: Config) -> Self {
        let fields = CustomFieldsConfig::load(&config.custom_fields);

        let api: SharedApi = match PlanfixClient::from_config(&config.planfix) {
            Ok(client) => Arc::new(client),
            Err(PlanfixError::NotConfigured(reason)) => {
                warn!("Planfix client unavailable: {}", reason);
                Arc::new(Unconfigured::new(reason))
            }
            Err(e) => {
                warn!("Planfix client unavailable: {}", e);
                Arc::new(Unconfigured::new(e.to_string()))
            }
        };
        let cache = RequestCache::from_config(&config.cache);

        Self::new(Arc::new(config), fields, api, cache)
    }

    /// Assemble a context from parts.
    pub fn new(
        config: Arc<Config>,
        fields: CustomFieldsConfig,
        api: SharedApi,
        cache: RequestCache,
    ) -> Self {
        let lead_task_schema = FieldSchema::from_fields(&fields.lead_task_fields);
        let contact_schema = FieldSchema::from_fields(&fields.contact_fields);

        let api: SharedApi = Arc::new(CachingApi::new(api, cache.clone()));
        let directories = DirectoryResolver::new(api.clone(), config.cache.ttl_secs);
        let objects = Arc::new(ObjectsCache::new(
            api.clone(),
            config.objects.path.clone(),
            Duration::from_secs(config.objects.ttl_secs),
        ));

        Self {
            config,
            fields: Arc::new(fields),
            lead_task_schema,
            contact_schema,
            api,
            cache,
            directories,
            objects,
        }
    }

    /// Lead task field definitions.
    pub fn lead_task_fields(&self) -> &[crate::domains::custom_fields::CustomField] {
        &self.fields.lead_task_fields
    }

    /// Contact field definitions.
    pub fn contact_fields(&self) -> &[crate::domains::custom_fields::CustomField] {
        &self.fields.contact_fields
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Context builders for tool tests.

    use super::*;
    use crate::domains::planfix::mock::MockApi;

    /// Context over `mock` with a fresh memory cache and a throwaway
    /// objects cache file.
    pub fn context_with(
        mock: Arc<MockApi>,
        fields: CustomFieldsConfig,
        objects_dir: &tempfile::TempDir,
    ) -> Arc<AppContext> {
        let mut config = Config::default();
        config.planfix.account = Some("acme".to_string());
        config.planfix.lead_template_id = Some(500);
        config.objects.path = objects_dir.path().join("objects.json");
        Arc::new(AppContext::new(
            Arc::new(config),
            fields,
            mock,
            RequestCache::memory(),
        ))
    }
}
