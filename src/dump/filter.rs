use std::collections::BTreeSet;

use crate::kube::ResourceKind;

/// Allow- and deny-list over lowercase names. An empty allow-list means no restriction.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NameFilter {
    include: BTreeSet<String>,
    exclude: BTreeSet<String>,
}

impl NameFilter {
    pub fn new<I, E, S, T>(include: I, exclude: E) -> Self
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self {
            include: normalize(include),
            exclude: normalize(exclude),
        }
    }

    fn is_excluded(&self, name: &str) -> bool {
        if !self.include.is_empty() && !self.include.contains(name) {
            return true;
        }

        if !self.exclude.is_empty() && self.exclude.contains(name) {
            return true;
        }

        false
    }
}

fn normalize<I, S>(names: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|name| name.as_ref().trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Returns true when `resource` must not be dumped.
pub fn skip_resource(resource: &ResourceKind, filter: &NameFilter) -> bool {
    // list できないリソースはダンプできない
    if !resource.supports_list() {
        return true;
    }

    // pods/status などのサブリソース
    if resource.is_subresource() {
        return true;
    }

    filter.is_excluded(&resource.name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectFilter {
    pub clusterscoped: bool,
    pub namespaced: bool,
    pub namespaces: NameFilter,
}

impl Default for ObjectFilter {
    fn default() -> Self {
        Self {
            clusterscoped: true,
            namespaced: true,
            namespaces: NameFilter::default(),
        }
    }
}

/// Returns true when an object living in `namespace` (empty for cluster-scoped) must not be dumped.
pub fn skip_object(namespace: &str, filter: &ObjectFilter) -> bool {
    if !namespace.is_empty() && !filter.namespaced {
        return true;
    }

    if namespace.is_empty() && !filter.clusterscoped {
        return true;
    }

    filter.namespaces.is_excluded(namespace)
}
