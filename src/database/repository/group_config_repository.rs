//! Group config repository.
//!
//! Every group's settings are loaded into memory once at startup and served
//! from there. Each mutation persists the full record before the cache is
//! updated, so a failed write leaves both sides unchanged.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::database::models::group_config::reconcile;
use crate::database::store::GroupStore;
use crate::database::{ConfigError, ConfigField, GroupConfig, SettingValue, StoreError};
use crate::moderation::{GroupId, UserId};

/// Single source of truth for per-group policy.
pub struct GroupConfigRepository {
    store: Arc<dyn GroupStore>,
    cache: DashMap<GroupId, GroupConfig>,
    template: GroupConfig,
    /// Serializes writers so cache and store see mutations in the same order.
    write_lock: Mutex<()>,
}

impl GroupConfigRepository {
    /// Load every stored group, migrating records to the current template.
    ///
    /// Unparsable records are logged and skipped; that group starts from the
    /// template on next access.
    pub async fn load(
        store: Arc<dyn GroupStore>,
        template: GroupConfig,
    ) -> Result<Self, StoreError> {
        let template_map = template.to_map();
        let cache = DashMap::new();
        let mut migrated = Vec::new();

        for record in store.load_all().await? {
            let Some(config) = decode(&record.data, &template_map, record.group_id, &mut migrated)
            else {
                continue;
            };
            cache.insert(record.group_id, config);
        }

        let repo = Self {
            store,
            cache,
            template,
            write_lock: Mutex::new(()),
        };

        for group_id in &migrated {
            let config = repo.cached(*group_id).unwrap_or_else(|| repo.template.clone());
            repo.persist(*group_id, &config).await?;
        }

        info!(
            "Group config store initialized, loaded {} groups ({} migrated)",
            repo.cache.len(),
            migrated.len()
        );
        Ok(repo)
    }

    fn cached(&self, group_id: GroupId) -> Option<GroupConfig> {
        self.cache.get(&group_id).map(|c| c.clone())
    }

    async fn persist(&self, group_id: GroupId, config: &GroupConfig) -> Result<(), StoreError> {
        let data = serde_json::to_string(config)?;
        self.store.save(group_id, &data).await
    }

    /// Get the settings of a group, creating them from the template if new.
    pub async fn get(&self, group_id: GroupId) -> Result<GroupConfig, StoreError> {
        if let Some(config) = self.cached(group_id) {
            return Ok(config);
        }

        let _guard = self.write_lock.lock().await;
        if let Some(config) = self.cached(group_id) {
            return Ok(config);
        }

        let config = self.template.clone();
        self.persist(group_id, &config).await?;
        self.cache.insert(group_id, config.clone());
        debug!("Created default config for group {}", group_id);
        Ok(config)
    }

    /// Apply `f` to the settings of a group and persist the result.
    ///
    /// Nothing is written if `f` left an existing record unchanged.
    pub async fn update<R, F>(&self, group_id: GroupId, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut GroupConfig) -> R,
    {
        let _guard = self.write_lock.lock().await;

        let existing = self.cached(group_id);
        let mut config = existing.clone().unwrap_or_else(|| self.template.clone());
        let out = f(&mut config);

        if existing.as_ref() != Some(&config) {
            self.persist(group_id, &config).await?;
            self.cache.insert(group_id, config);
        }
        Ok(out)
    }

    /// Read one setting.
    pub async fn get_field(
        &self,
        group_id: GroupId,
        field: ConfigField,
    ) -> Result<SettingValue, StoreError> {
        Ok(self.get(group_id).await?.value(field))
    }

    /// Overwrite one setting.
    pub async fn set_field(
        &self,
        group_id: GroupId,
        field: ConfigField,
        value: SettingValue,
    ) -> Result<(), ConfigError> {
        self.update(group_id, |config| config.assign(field, value)).await?
    }

    /// Add to a list setting; a no-op returning `false` if already present.
    pub async fn add(
        &self,
        group_id: GroupId,
        field: ConfigField,
        item: &str,
    ) -> Result<bool, ConfigError> {
        self.update(group_id, |config| config.list_add(field, item)).await?
    }

    /// Remove from a list setting; a no-op returning `false` if absent.
    pub async fn remove(
        &self,
        group_id: GroupId,
        field: ConfigField,
        item: &str,
    ) -> Result<bool, ConfigError> {
        self.update(group_id, |config| config.list_remove(field, item)).await?
    }

    /// Apply several list edits in one write. Nothing changes if any item
    /// is invalid.
    pub async fn edit_list(
        &self,
        group_id: GroupId,
        field: ConfigField,
        add: &[String],
        remove: &[String],
    ) -> Result<(), ConfigError> {
        self.update(group_id, |config| -> Result<(), ConfigError> {
            let mut next = config.clone();
            for item in add {
                next.list_add(field, item)?;
            }
            for item in remove {
                next.list_remove(field, item)?;
            }
            *config = next;
            Ok(())
        })
        .await?
    }

    /// Every setting of a group, in declaration order.
    pub async fn all(
        &self,
        group_id: GroupId,
    ) -> Result<Vec<(ConfigField, SettingValue)>, StoreError> {
        let config = self.get(group_id).await?;
        Ok(ConfigField::ALL
            .iter()
            .map(|&field| (field, config.value(field)))
            .collect())
    }

    /// Put a user on the join blacklist. Returns `false` if already there.
    pub async fn block_user(&self, group_id: GroupId, user_id: UserId) -> Result<bool, StoreError> {
        self.update(group_id, |config| {
            if config.is_blocked(user_id) {
                false
            } else {
                config.block_ids.push(user_id);
                true
            }
        })
        .await
    }

    /// Overwrite a group's settings with a fresh copy of the template.
    pub async fn reset(&self, group_id: GroupId) -> Result<(), StoreError> {
        let template = self.template.clone();
        self.update(group_id, move |config| *config = template).await?;
        info!("Reset config of group {}", group_id);
        Ok(())
    }

    /// Reset every known group.
    pub async fn reset_all(&self) -> Result<usize, StoreError> {
        let groups: Vec<GroupId> = self.cache.iter().map(|entry| *entry.key()).collect();
        for group_id in &groups {
            self.reset(*group_id).await?;
        }
        Ok(groups.len())
    }

    /// Forget a group entirely.
    pub async fn delete(&self, group_id: GroupId) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.store.delete(group_id).await?;
        self.cache.remove(&group_id);
        info!("Deleted config of group {}", group_id);
        Ok(())
    }

    /// Release the durable store. Call only after all writers are done.
    pub async fn close(&self) {
        let _guard = self.write_lock.lock().await;
        self.store.close().await;
    }
}

/// Parse and migrate one stored blob.
fn decode(
    data: &str,
    template: &Map<String, Value>,
    group_id: GroupId,
    migrated: &mut Vec<GroupId>,
) -> Option<GroupConfig> {
    let stored = match serde_json::from_str::<Value>(data) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            error!("Config of group {} is not an object, skipping", group_id);
            return None;
        }
        Err(e) => {
            error!("Failed to parse config of group {}: {}", group_id, e);
            return None;
        }
    };

    let (map, changed) = reconcile(stored, template);
    match serde_json::from_value::<GroupConfig>(Value::Object(map)) {
        Ok(config) => {
            if changed {
                migrated.push(group_id);
            }
            Some(config)
        }
        Err(e) => {
            error!("Failed to decode config of group {}: {}", group_id, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryGroupStore;

    async fn repo_with(store: Arc<MemoryGroupStore>) -> GroupConfigRepository {
        GroupConfigRepository::load(store, GroupConfig::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_creates_and_persists_default() {
        let store = Arc::new(MemoryGroupStore::new());
        let repo = repo_with(store.clone()).await;

        let config = repo.get(-1).await.unwrap();

        assert_eq!(config, GroupConfig::default());
        assert!(store.raw(-1).is_some());
    }

    #[tokio::test]
    async fn test_set_field_survives_reload() {
        let store = Arc::new(MemoryGroupStore::new());
        let repo = repo_with(store.clone()).await;

        repo.set_field(-1, ConfigField::MinLevel, SettingValue::Int(5))
            .await
            .unwrap();
        repo.add(-1, ConfigField::RejectWords, "casino").await.unwrap();

        let reloaded = repo_with(store).await;
        assert_eq!(
            reloaded.get_field(-1, ConfigField::MinLevel).await.unwrap(),
            SettingValue::Int(5)
        );
        assert_eq!(
            reloaded.get_field(-1, ConfigField::RejectWords).await.unwrap(),
            SettingValue::List(vec!["casino".into()])
        );
    }

    #[tokio::test]
    async fn test_invalid_value_does_not_mutate() {
        let store = Arc::new(MemoryGroupStore::new());
        let repo = repo_with(store).await;
        repo.set_field(-1, ConfigField::VoteThreshold, SettingValue::Int(4))
            .await
            .unwrap();

        let err = repo
            .set_field(-1, ConfigField::VoteThreshold, SettingValue::Text("many".into()))
            .await;

        assert!(matches!(err, Err(ConfigError::InvalidValue { .. })));
        assert_eq!(repo.get(-1).await.unwrap().vote_threshold, 4);
    }

    #[tokio::test]
    async fn test_unparsable_record_is_skipped() {
        let store = Arc::new(MemoryGroupStore::with_records([
            (-1, "not json".to_string()),
            (-2, serde_json::to_string(&GroupConfig::default()).unwrap()),
        ]));

        let repo = repo_with(store).await;

        assert!(repo.cached(-1).is_none());
        assert!(repo.cached(-2).is_some());
        assert_eq!(repo.get(-1).await.unwrap(), GroupConfig::default());
    }

    #[tokio::test]
    async fn test_failed_write_keeps_cache_unchanged() {
        let store = Arc::new(MemoryGroupStore::new());
        let repo = repo_with(store.clone()).await;
        repo.get(-1).await.unwrap();

        store.close().await;
        assert!(repo.block_user(-1, 7).await.is_err());
        assert!(!repo.get(-1).await.unwrap().is_blocked(7));
    }

    #[tokio::test]
    async fn test_edit_list_is_all_or_nothing() {
        let store = Arc::new(MemoryGroupStore::new());
        let repo = repo_with(store).await;
        repo.block_user(-1, 7).await.unwrap();

        let bad = repo
            .edit_list(-1, ConfigField::BlockIds, &["8".into(), "x".into()], &["7".into()])
            .await;
        assert!(bad.is_err());
        assert_eq!(repo.get(-1).await.unwrap().block_ids, vec![7]);

        repo.edit_list(-1, ConfigField::BlockIds, &["8".into()], &["7".into()])
            .await
            .unwrap();
        assert_eq!(repo.get(-1).await.unwrap().block_ids, vec![8]);
    }

    #[tokio::test]
    async fn test_delete_forgets_group() {
        let store = Arc::new(MemoryGroupStore::new());
        let repo = repo_with(store.clone()).await;
        repo.block_user(-1, 7).await.unwrap();

        repo.delete(-1).await.unwrap();

        assert!(store.raw(-1).is_none());
        assert!(!repo.get(-1).await.unwrap().is_blocked(7));
    }

    #[tokio::test]
    async fn test_reset_restores_template() {
        let store = Arc::new(MemoryGroupStore::new());
        let repo = repo_with(store).await;
        repo.block_user(-1, 7).await.unwrap();

        repo.reset(-1).await.unwrap();

        assert!(repo.get(-1).await.unwrap().block_ids.is_empty());
    }
}
