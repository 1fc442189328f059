use anyhow::Result;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{APIGroupList, APIResourceList, APIVersions};

use crate::logger;

use super::{
    client::KubeClientRequest,
    object::{Object, ObjectList},
    resource::{group_version_url, ResourceKind, ServerGroup},
};

const CORE_API_PATH: &str = "/api";
const GROUP_API_PATH: &str = "/apis";

/// `kubectl api-versions` 相当。core グループを先頭に、各グループは preferredVersion を先頭に返す
pub async fn fetch_server_groups<C: KubeClientRequest>(client: &C) -> Result<Vec<ServerGroup>> {
    let core = client.request::<APIVersions>(CORE_API_PATH).await?;

    let groups = client.request::<APIGroupList>(GROUP_API_PATH).await?;

    let mut ret = Vec::with_capacity(groups.groups.len() + 1);

    ret.push(ServerGroup::new("", core.versions));

    ret.extend(groups.groups.into_iter().map(|group| {
        let mut versions: Vec<String> = group
            .versions
            .into_iter()
            .map(|version| version.version)
            .collect();

        if let Some(pos) = group
            .preferred_version
            .and_then(|preferred| versions.iter().position(|v| *v == preferred.version))
        {
            let preferred = versions.remove(pos);
            versions.insert(0, preferred);
        }

        ServerGroup::new(group.name, versions)
    }));

    Ok(ret)
}

pub async fn fetch_resource_kinds<C: KubeClientRequest>(
    client: &C,
    group: &str,
    version: &str,
) -> Result<Vec<ResourceKind>> {
    let list = client
        .request::<APIResourceList>(&group_version_url(group, version))
        .await?;

    Ok(list
        .resources
        .into_iter()
        .map(|resource| ResourceKind::from_api_resource(group, version, resource))
        .collect())
}

/// Lists every object of `resource` across all namespaces in one request.
pub async fn fetch_objects<C: KubeClientRequest>(
    client: &C,
    resource: &ResourceKind,
) -> Result<Vec<Object>> {
    let path = resource.api_url();

    logger!(debug, "Fetching objects [{}]", path);

    let list = client.request::<ObjectList>(&path).await?;

    Ok(list
        .items
        .into_iter()
        .map(|mut obj| {
            obj.ensure_type_meta(resource);
            obj
        })
        .collect())
}
