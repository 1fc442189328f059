use serde::{Deserialize, Serialize};

use crate::kube::Object;

pub type FieldPath = Vec<String>;

pub const DEFAULT_TABLE_VERSION: &str = "v1";

// Cluster-scoped and namespaced objects.
const FIELDS: &[&[&str]] = &[
    &["metadata", "annotations", "control-plane.alpha.kubernetes.io/leader"],
    &["metadata", "annotations", "kubectl.kubernetes.io/last-applied-configuration"],
    &["metadata", "creationTimestamp"],
    &["metadata", "finalizers"],
    &["metadata", "generation"],
    &["metadata", "managedFields"],
    &["metadata", "resourceVersion"],
    &["metadata", "selfLink"],
    &["metadata", "ownerReferences"],
    &["metadata", "uid"],
    &["status"],
];

// Namespaced objects only.
const NAMESPACED_FIELDS: &[&[&str]] = &[
    &["metadata", "annotations", "autoscaling.alpha.kubernetes.io/conditions"],
    &["metadata", "annotations", "autoscaling.alpha.kubernetes.io/current-metrics"],
    &["metadata", "annotations", "deployment.kubernetes.io/revision"],
    &["metadata", "annotations", "kubernetes.io/config.seen"],
    &["metadata", "annotations", "kubernetes.io/service-account.uid"],
    &["metadata", "annotations", "pv.kubernetes.io/bind-completed"],
    &["metadata", "annotations", "pv.kubernetes.io/bound-by-controller"],
    &["spec", "clusterIP"],
    &["spec", "progressDeadlineSeconds"],
    &["spec", "revisionHistoryLimit"],
    &["spec", "template", "metadata", "annotations", "kubectl.kubernetes.io/restartedAt"],
    &["spec", "template", "metadata", "creationTimestamp"],
    &["spec", "volumeName"],
    &["spec", "volumeMode"],
];

fn to_paths(table: &[&[&str]]) -> Vec<FieldPath> {
    table
        .iter()
        .map(|path| path.iter().map(ToString::to_string).collect())
        .collect()
}

/// Versioned table of the fields removed in stateless mode.
///
/// The defaults are tied to the built-in Kubernetes resource schemas. A
/// config file may replace either tier (see [`crate::config::Config`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatelessConfig {
    pub version: String,
    /// Removed from every object.
    pub fields: Vec<FieldPath>,
    /// Removed from namespaced objects only.
    pub namespaced_fields: Vec<FieldPath>,
}

impl Default for StatelessConfig {
    fn default() -> Self {
        Self {
            version: DEFAULT_TABLE_VERSION.to_string(),
            fields: to_paths(FIELDS),
            namespaced_fields: to_paths(NAMESPACED_FIELDS),
        }
    }
}

impl StatelessConfig {
    /// Strips runtime state from `obj` in place. Removing an absent field is a no-op,
    /// so applying this twice yields the same object.
    pub fn clean_state(&self, obj: &mut Object) {
        let namespaced = obj.is_namespaced();

        for path in &self.fields {
            obj.remove_nested_field(path);
        }

        if namespaced {
            for path in &self.namespaced_fields {
                obj.remove_nested_field(path);
            }
        }
    }
}
