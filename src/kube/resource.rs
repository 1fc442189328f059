use std::fmt::Display;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResource;

const LIST_VERB: &str = "list";

const SUBRESOURCE_DELIMITER: char = '/';

/// サーバーが公開しているAPIグループと、そのバージョン一覧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerGroup {
    /// core グループは空文字
    pub name: String,
    pub versions: Vec<String>,
}

impl ServerGroup {
    pub fn new(name: impl Into<String>, versions: Vec<String>) -> Self {
        Self {
            name: name.into(),
            versions,
        }
    }
}

/// One listable resource type of a (group, version), as reported by discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceKind {
    pub group: String,
    pub version: String,
    /// Plural resource name, e.g. `deployments` or `pods/status`.
    pub name: String,
    pub kind: String,
    pub verbs: Vec<String>,
    pub namespaced: bool,
}

impl ResourceKind {
    pub fn from_api_resource(group: &str, version: &str, resource: APIResource) -> Self {
        let APIResource {
            name,
            kind,
            verbs,
            namespaced,
            ..
        } = resource;

        Self {
            group: group.to_string(),
            version: version.to_string(),
            name,
            kind,
            verbs,
            namespaced,
        }
    }

    pub fn is_core(&self) -> bool {
        self.group.is_empty()
    }

    pub fn supports_list(&self) -> bool {
        self.verbs.iter().any(|verb| verb == LIST_VERB)
    }

    pub fn is_subresource(&self) -> bool {
        self.name.contains(SUBRESOURCE_DELIMITER)
    }

    pub fn api_version(&self) -> String {
        if self.is_core() {
            self.version.to_string()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    pub fn group_version_url(&self) -> String {
        group_version_url(&self.group, &self.version)
    }

    pub fn api_url(&self) -> String {
        format!("{}/{}", self.group_version_url(), self.name)
    }

    /// Directory key of this resource. The resource name alone is not unique
    /// (`pods` vs `pods.metrics.k8s.io`), so the group is appended when present.
    pub fn resource_and_group(&self) -> String {
        if self.is_core() {
            self.name.to_string()
        } else {
            format!("{}.{}", self.name, self.group)
        }
    }
}

pub fn group_version_url(group: &str, version: &str) -> String {
    if group.is_empty() {
        format!("/api/{}", version)
    } else {
        format!("/apis/{}/{}", group, version)
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.resource_and_group(), self.version)
    }
}
