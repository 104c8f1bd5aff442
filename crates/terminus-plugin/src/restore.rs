//! Restore item action plugin.
//!
//! The host calls [`RestoreItemAction::execute`] for every item it is about
//! to recreate; the action may rewrite the item before it reaches the API
//! server.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::unstructured::{self, UnstructuredError};

/// Kind whose `spec.init` must not be replayed on restore.
pub const REDIS_CLUSTER_KIND: &str = "DistributedRedisCluster";

/// Resources an action wants to see. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSelector {
    #[serde(default)]
    pub included_namespaces: Vec<String>,
    #[serde(default)]
    pub excluded_namespaces: Vec<String>,
    #[serde(default)]
    pub included_resources: Vec<String>,
    #[serde(default)]
    pub excluded_resources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreRef {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreItemActionInput {
    /// Item as it will be restored, possibly already modified by other actions.
    pub item: Value,
    /// Item as stored in the backup.
    pub item_from_backup: Value,
    pub restore: RestoreRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceIdentifier {
    pub group_resource: String,
    #[serde(default)]
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreItemActionOutput {
    pub updated_item: Value,
    #[serde(default)]
    pub additional_items: Vec<ResourceIdentifier>,
    #[serde(default)]
    pub skip_restore: bool,
}

impl RestoreItemActionOutput {
    pub fn new(updated_item: Value) -> Self {
        Self {
            updated_item,
            additional_items: Vec::new(),
            skip_restore: false,
        }
    }
}

pub trait RestoreItemAction: Send + Sync {
    fn applies_to(&self) -> ResourceSelector;

    fn execute(
        &self,
        input: RestoreItemActionInput,
    ) -> Result<RestoreItemActionOutput, UnstructuredError>;
}

/// Clears `spec.init` on redis clusters so the operator does not
/// re-initialise restored data.
#[derive(Debug, Clone, Default)]
pub struct TerminusRestoreAction;

impl TerminusRestoreAction {
    pub fn new() -> Self {
        Self
    }
}

impl RestoreItemAction for TerminusRestoreAction {
    fn applies_to(&self) -> ResourceSelector {
        tracing::debug!("restore action applies to all resources");
        ResourceSelector::default()
    }

    fn execute(
        &self,
        input: RestoreItemActionInput,
    ) -> Result<RestoreItemActionOutput, UnstructuredError> {
        let mut item = input.item;
        if !item.is_object() {
            return Err(UnstructuredError::WrongType {
                path: ".".to_string(),
                expected: "an object",
            });
        }

        let kind = item.get("kind").and_then(Value::as_str).unwrap_or_default();
        tracing::info!(restore = %input.restore.name, kind, "executing restore action");

        if kind == REDIS_CLUSTER_KIND && unstructured::get_map(&item, "spec").is_ok() {
            unstructured::set_value(&mut item, "spec.init", Value::Null)?;
            tracing::info!(restore = %input.restore.name, "cleared spec.init");
        }

        Ok(RestoreItemActionOutput::new(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(item: Value) -> RestoreItemActionInput {
        RestoreItemActionInput {
            item_from_backup: item.clone(),
            item,
            restore: RestoreRef {
                name: "restore-1".to_string(),
                namespace: "velero".to_string(),
            },
        }
    }

    #[test]
    fn test_applies_to_everything() {
        assert_eq!(TerminusRestoreAction::new().applies_to(), ResourceSelector::default());
    }

    #[test]
    fn test_redis_cluster_init_cleared() {
        let item = json!({
            "kind": "DistributedRedisCluster",
            "metadata": {"name": "redis"},
            "spec": {"init": {"backupSource": {"name": "b1"}}, "masterSize": 3}
        });
        let out = TerminusRestoreAction.execute(input(item)).unwrap();
        assert_eq!(out.updated_item["spec"]["init"], Value::Null);
        assert!(out.updated_item["spec"].as_object().unwrap().contains_key("init"));
        assert_eq!(out.updated_item["spec"]["masterSize"], 3);
        assert!(!out.skip_restore);
        assert!(out.additional_items.is_empty());
    }

    #[test]
    fn test_other_kinds_unchanged() {
        let item = json!({"kind": "Deployment", "spec": {"init": {"x": 1}}});
        let out = TerminusRestoreAction.execute(input(item.clone())).unwrap();
        assert_eq!(out.updated_item, item);
    }

    #[test]
    fn test_redis_cluster_without_spec_unchanged() {
        let item = json!({"kind": "DistributedRedisCluster", "spec": "bogus"});
        let out = TerminusRestoreAction.execute(input(item.clone())).unwrap();
        assert_eq!(out.updated_item, item);

        let bare = json!({"kind": "DistributedRedisCluster"});
        let out = TerminusRestoreAction.execute(input(bare.clone())).unwrap();
        assert_eq!(out.updated_item, bare);
    }

    #[test]
    fn test_non_object_item_rejected() {
        assert!(TerminusRestoreAction.execute(input(json!([1, 2]))).is_err());
    }
}
