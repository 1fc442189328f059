use std::{collections::HashSet, path::PathBuf, sync::Arc, time::Instant};

use tokio::{
    sync::Semaphore,
    task::{spawn_blocking, JoinSet},
};

use crate::{
    error::DumpError,
    kube::{
        discovery::{fetch_objects, fetch_resource_kinds, fetch_server_groups},
        KubeClientRequest, ResourceKind,
    },
    logger,
};

use super::{
    filter::{skip_object, skip_resource, NameFilter, ObjectFilter},
    stateless::StatelessConfig,
    stats::{DumpStats, DumpSummary},
    writer::write_yaml,
};

pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

#[derive(Debug, Clone)]
pub struct DumpConfig {
    pub out_dir: PathBuf,
    pub resources: NameFilter,
    pub objects: ObjectFilter,
    /// `None` keeps objects as returned by the server.
    pub stateless: Option<StatelessConfig>,
    pub max_concurrency: usize,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("dump"),
            resources: NameFilter::default(),
            objects: ObjectFilter::default(),
            stateless: Some(StatelessConfig::default()),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// Discovers every resource kind of the cluster and writes each object to its own file.
///
/// Each (group, version, resource) is one unit. A resource served by several
/// versions of its group is dumped once, from the first (preferred) version.
/// At most `max_concurrency` units list and write at the same time; the
/// discovery loop waits for a free slot before scheduling the next one.
/// Failures of a unit or of a single object are logged and never abort the run.
pub struct Dumper<C> {
    client: Arc<C>,
    config: Arc<DumpConfig>,
}

impl<C> Dumper<C>
where
    C: KubeClientRequest + 'static,
{
    pub fn new(client: C, config: DumpConfig) -> Result<Self, DumpError> {
        if config.max_concurrency == 0 {
            return Err(DumpError::InvalidConcurrency);
        }

        Ok(Self {
            client: Arc::new(client),
            config: Arc::new(config),
        })
    }

    pub async fn run(&self) -> Result<DumpSummary, DumpError> {
        let stats = DumpStats::shared(Instant::now());

        let groups = fetch_server_groups(self.client.as_ref())
            .await
            .map_err(DumpError::ServerGroups)?;

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));

        let mut join_set = JoinSet::new();

        let mut scheduled = HashSet::new();

        for group in &groups {
            for version in &group.versions {
                let resources = match fetch_resource_kinds(
                    self.client.as_ref(),
                    &group.name,
                    version,
                )
                .await
                {
                    Ok(resources) => resources,
                    Err(err) => {
                        logger!(
                            error,
                            "failed getting resources for {:?}: {}",
                            group_version(&group.name, version),
                            err
                        );
                        continue;
                    }
                };

                for resource in resources {
                    if skip_resource(&resource, &self.config.resources) {
                        continue;
                    }

                    // 同じリソースは別バージョンでも同じファイルに書き出されるため一度だけ
                    if !scheduled.insert(resource.resource_and_group()) {
                        logger!(debug, "skip {}: already scheduled", resource);
                        continue;
                    }

                    // Blocks discovery until a slot is free.
                    let permit = semaphore.clone().acquire_owned().await?;

                    let client = self.client.clone();
                    let config = self.config.clone();
                    let stats = stats.clone();

                    join_set.spawn(async move {
                        dump_resource(client.as_ref(), &resource, &config, &stats).await;

                        drop(permit);
                    });
                }
            }
        }

        while let Some(ret) = join_set.join_next().await {
            if let Err(err) = ret {
                logger!(error, "dump task failed: {}", err);
            }
        }

        Ok(stats.summary())
    }
}

fn group_version(group: &str, version: &str) -> String {
    if group.is_empty() {
        version.to_string()
    } else {
        format!("{}/{}", group, version)
    }
}

/// Lists and writes all objects of one resource kind.
async fn dump_resource<C: KubeClientRequest>(
    client: &C,
    resource: &ResourceKind,
    config: &DumpConfig,
    stats: &DumpStats,
) {
    logger!(
        info,
        "processing group={} resource={}",
        resource.group,
        resource.name
    );

    let objects = match fetch_objects(client, resource).await {
        Ok(objects) => objects,
        Err(err) => {
            logger!(error, "failed listing {}: {}", resource, err);
            return;
        }
    };

    let resource_and_group = resource.resource_and_group();

    let mut written = 0;

    for mut obj in objects {
        if skip_object(obj.namespace(), &config.objects) {
            continue;
        }

        logger!(
            debug,
            "processing manifest group={} version={} resource={} namespace={} name={:?}",
            resource.group,
            resource.version,
            resource.name,
            obj.namespace(),
            obj.name()
        );

        if let Some(stateless) = &config.stateless {
            stateless.clean_state(&mut obj);
        }

        let target = format!("{}/{}", obj.namespace(), obj.name());

        let out_dir = config.out_dir.clone();
        let key = resource_and_group.clone();

        // std::fs はワーカースレッドをブロックするので blocking プールで書き込む
        let ret = spawn_blocking(move || write_yaml(&out_dir, &key, &obj)).await;

        match ret {
            Ok(Ok(_)) => {
                stats.increment_written();
                written += 1;
            }
            Ok(Err(err)) => {
                logger!(error, "failed writing {}: {}", target, err);
            }
            Err(err) => {
                logger!(error, "write task for {} failed: {}", target, err);
            }
        }
    }

    logger!(
        info,
        "finished {} ({} written, {} total)",
        resource,
        written,
        stats.written()
    );
}

#[cfg(test)]
mod tests {
    use std::{
        collections::BTreeSet,
        fs,
        path::Path,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use indoc::indoc;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{
        APIGroupList, APIResourceList, APIVersions,
    };
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;
    use serde::de::DeserializeOwned;
    use serde_json::{json, Value};

    use crate::{
        kube::{mock::MockTestKubeClient, ObjectList},
        mock_expect,
    };

    use super::*;

    fn core_versions() -> APIVersions {
        serde_json::from_value(json!({
            "versions": ["v1"],
            "serverAddressByClientCIDRs": []
        }))
        .unwrap()
    }

    fn api_groups() -> APIGroupList {
        serde_yaml::from_str(indoc! {
            r#"
            groups:
              - name: example.com
                versions:
                  - groupVersion: example.com/v1
                    version: v1
            "#
        })
        .unwrap()
    }

    fn core_resources() -> APIResourceList {
        serde_yaml::from_str(indoc! {
            r#"
            groupVersion: v1
            resources:
              - name: nodes
                singularName: node
                namespaced: false
                kind: Node
                verbs: [get, list, watch]
              - name: nodes/status
                singularName: ""
                namespaced: false
                kind: Node
                verbs: [get, list, patch, update]
              - name: bindings
                singularName: binding
                namespaced: true
                kind: Binding
                verbs: [create]
            "#
        })
        .unwrap()
    }

    fn example_resources() -> APIResourceList {
        serde_yaml::from_str(indoc! {
            r#"
            groupVersion: example.com/v1
            resources:
              - name: widgets
                singularName: widget
                namespaced: true
                kind: Widget
                verbs: [get, list, watch]
            "#
        })
        .unwrap()
    }

    fn nodes() -> ObjectList {
        serde_json::from_value(json!({
            "items": [{
                "metadata": {
                    "name": "node-1",
                    "resourceVersion": "100",
                    "uid": "1d2c"
                },
                "spec": { "podCIDR": "10.244.0.0/24" },
                "status": { "phase": "Running" }
            }]
        }))
        .unwrap()
    }

    fn widgets() -> ObjectList {
        serde_json::from_value(json!({
            "items": [{
                "apiVersion": "example.com/v1",
                "kind": "Widget",
                "metadata": {
                    "name": "widget-1",
                    "namespace": "team-a",
                    "resourceVersion": "200"
                },
                "spec": { "size": 3 },
                "status": { "ready": true }
            }]
        }))
        .unwrap()
    }

    fn discovery_client() -> MockTestKubeClient {
        let mut client = MockTestKubeClient::new();

        mock_expect!(
            client,
            request,
            [
                (APIVersions, eq("/api"), Ok(core_versions())),
                (APIGroupList, eq("/apis"), Ok(api_groups())),
                (APIResourceList, eq("/api/v1"), Ok(core_resources())),
                (APIResourceList, eq("/apis/example.com/v1"), Ok(example_resources()))
            ]
        );

        client
    }

    fn config(out_dir: &Path) -> DumpConfig {
        DumpConfig {
            out_dir: out_dir.to_path_buf(),
            ..Default::default()
        }
    }

    fn written_files(root: &Path) -> BTreeSet<String> {
        fn walk(root: &Path, dir: &Path, files: &mut BTreeSet<String>) {
            let Ok(entries) = fs::read_dir(dir) else {
                return;
            };

            for entry in entries {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    walk(root, &path, files);
                } else {
                    let relative = path.strip_prefix(root).unwrap();
                    files.insert(relative.to_string_lossy().replace('\\', "/"));
                }
            }
        }

        let mut files = BTreeSet::new();
        walk(root, root, &mut files);
        files
    }

    fn read_yaml(path: &Path) -> Value {
        serde_yaml::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn すべてのオブジェクトをステートレスで書き出す() {
        let tmp = tempfile::tempdir().unwrap();

        let mut client = discovery_client();

        mock_expect!(
            client,
            request,
            [
                (ObjectList, eq("/api/v1/nodes"), Ok(nodes())),
                (ObjectList, eq("/apis/example.com/v1/widgets"), Ok(widgets()))
            ]
        );

        client
            .expect_request::<ObjectList>()
            .with(eq("/api/v1/bindings"))
            .never();

        client
            .expect_request::<ObjectList>()
            .with(eq("/api/v1/nodes/status"))
            .never();

        let summary = Dumper::new(client, config(tmp.path()))
            .unwrap()
            .run()
            .await
            .unwrap();

        assert_eq!(summary.written, 2);
        assert_eq!(
            written_files(tmp.path()),
            BTreeSet::from([
                "clusterscoped/nodes/node-1.yaml".to_string(),
                "namespaced/team-a/widgets.example.com/widget-1.yaml".to_string(),
            ])
        );

        assert_eq!(
            read_yaml(&tmp.path().join("clusterscoped/nodes/node-1.yaml")),
            json!({
                "apiVersion": "v1",
                "kind": "Node",
                "metadata": { "name": "node-1" },
                "spec": { "podCIDR": "10.244.0.0/24" }
            })
        );

        assert_eq!(
            read_yaml(&tmp.path().join("namespaced/team-a/widgets.example.com/widget-1.yaml")),
            json!({
                "apiVersion": "example.com/v1",
                "kind": "Widget",
                "metadata": { "name": "widget-1", "namespace": "team-a" },
                "spec": { "size": 3 }
            })
        );
    }

    #[tokio::test]
    async fn 許可リストにあるリソースだけを書き出す() {
        let tmp = tempfile::tempdir().unwrap();

        let mut client = discovery_client();

        mock_expect!(client, request, ObjectList, eq("/api/v1/nodes"), Ok(nodes()));

        client
            .expect_request::<ObjectList>()
            .with(eq("/apis/example.com/v1/widgets"))
            .never();

        let config = DumpConfig {
            resources: NameFilter::new(["nodes"], Vec::<String>::new()),
            ..config(tmp.path())
        };

        let summary = Dumper::new(client, config).unwrap().run().await.unwrap();

        assert_eq!(summary.written, 1);
        assert_eq!(
            written_files(tmp.path()),
            BTreeSet::from(["clusterscoped/nodes/node-1.yaml".to_string()])
        );
    }

    #[tokio::test]
    async fn 一覧の取得に失敗したリソース以外は書き出す() {
        let tmp = tempfile::tempdir().unwrap();

        let mut client = discovery_client();

        mock_expect!(
            client,
            request,
            [
                (ObjectList, eq("/api/v1/nodes"), bail!("transport error")),
                (ObjectList, eq("/apis/example.com/v1/widgets"), Ok(widgets()))
            ]
        );

        let summary = Dumper::new(client, config(tmp.path()))
            .unwrap()
            .run()
            .await
            .unwrap();

        assert_eq!(summary.written, 1);
        assert_eq!(
            written_files(tmp.path()),
            BTreeSet::from(["namespaced/team-a/widgets.example.com/widget-1.yaml".to_string()])
        );
    }

    #[tokio::test]
    async fn リソース一覧の取得に失敗したバージョンは飛ばす() {
        let tmp = tempfile::tempdir().unwrap();

        let mut client = MockTestKubeClient::new();

        mock_expect!(
            client,
            request,
            [
                (APIVersions, eq("/api"), Ok(core_versions())),
                (APIGroupList, eq("/apis"), Ok(api_groups())),
                (APIResourceList, eq("/api/v1"), bail!("service unavailable")),
                (APIResourceList, eq("/apis/example.com/v1"), Ok(example_resources())),
                (ObjectList, eq("/apis/example.com/v1/widgets"), Ok(widgets()))
            ]
        );

        let summary = Dumper::new(client, config(tmp.path()))
            .unwrap()
            .run()
            .await
            .unwrap();

        assert_eq!(summary.written, 1);
    }

    #[tokio::test]
    async fn グループ一覧の取得に失敗したときはエラーを返す() {
        let tmp = tempfile::tempdir().unwrap();

        let mut client = MockTestKubeClient::new();

        mock_expect!(client, request, APIVersions, eq("/api"), bail!("connection refused"));

        let actual = Dumper::new(client, config(tmp.path())).unwrap().run().await;

        assert!(matches!(actual, Err(DumpError::ServerGroups(_))));
        assert!(written_files(tmp.path()).is_empty());
    }

    #[tokio::test]
    async fn statelessを無効にするとそのまま書き出す() {
        let tmp = tempfile::tempdir().unwrap();

        let mut client = discovery_client();

        mock_expect!(
            client,
            request,
            [
                (ObjectList, eq("/api/v1/nodes"), Ok(nodes())),
                (ObjectList, eq("/apis/example.com/v1/widgets"), Ok(widgets()))
            ]
        );

        let config = DumpConfig {
            stateless: None,
            objects: ObjectFilter {
                namespaced: false,
                ..Default::default()
            },
            ..config(tmp.path())
        };

        let summary = Dumper::new(client, config).unwrap().run().await.unwrap();

        assert_eq!(summary.written, 1);

        let node = read_yaml(&tmp.path().join("clusterscoped/nodes/node-1.yaml"));

        assert_eq!(node["metadata"]["resourceVersion"], "100");
        assert_eq!(node["status"]["phase"], "Running");
    }

    #[test]
    fn 同時実行数0はエラーになる() {
        let config = DumpConfig {
            max_concurrency: 0,
            ..Default::default()
        };

        let actual = Dumper::new(MockTestKubeClient::new(), config);

        assert!(matches!(actual, Err(DumpError::InvalidConcurrency)));
    }

    fn autoscaling_groups() -> APIGroupList {
        serde_yaml::from_str(indoc! {
            r#"
            groups:
              - name: autoscaling
                versions:
                  - groupVersion: autoscaling/v2
                    version: v2
                  - groupVersion: autoscaling/v1
                    version: v1
                preferredVersion:
                  groupVersion: autoscaling/v2
                  version: v2
            "#
        })
        .unwrap()
    }

    fn hpa_resources(version: &str) -> APIResourceList {
        serde_json::from_value(json!({
            "groupVersion": format!("autoscaling/{}", version),
            "resources": [{
                "name": "horizontalpodautoscalers",
                "singularName": "horizontalpodautoscaler",
                "namespaced": true,
                "kind": "HorizontalPodAutoscaler",
                "verbs": ["get", "list", "watch"]
            }]
        }))
        .unwrap()
    }

    fn hpas() -> ObjectList {
        serde_json::from_value(json!({
            "items": [{
                "apiVersion": "autoscaling/v2",
                "kind": "HorizontalPodAutoscaler",
                "metadata": { "name": "web", "namespace": "team-a" },
                "spec": { "maxReplicas": 5 }
            }]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn 複数バージョンで提供されるリソースは優先バージョンで一度だけ書き出す() {
        let tmp = tempfile::tempdir().unwrap();

        let mut client = MockTestKubeClient::new();

        mock_expect!(
            client,
            request,
            [
                (APIVersions, eq("/api"), Ok(core_versions())),
                (APIGroupList, eq("/apis"), Ok(autoscaling_groups())),
                (
                    APIResourceList,
                    eq("/api/v1"),
                    Ok(serde_json::from_value(json!({ "groupVersion": "v1", "resources": [] }))
                        .unwrap())
                ),
                (APIResourceList, eq("/apis/autoscaling/v2"), Ok(hpa_resources("v2"))),
                (APIResourceList, eq("/apis/autoscaling/v1"), Ok(hpa_resources("v1")))
            ]
        );

        client
            .expect_request::<ObjectList>()
            .with(eq("/apis/autoscaling/v2/horizontalpodautoscalers"))
            .times(1)
            .returning(|_| Ok(hpas()));

        client
            .expect_request::<ObjectList>()
            .with(eq("/apis/autoscaling/v1/horizontalpodautoscalers"))
            .never();

        let summary = Dumper::new(client, config(tmp.path()))
            .unwrap()
            .run()
            .await
            .unwrap();

        let path = "namespaced/team-a/horizontalpodautoscalers.autoscaling/web.yaml";

        assert_eq!(summary.written, 1);
        assert_eq!(written_files(tmp.path()), BTreeSet::from([path.to_string()]));
        assert_eq!(read_yaml(&tmp.path().join(path))["apiVersion"], "autoscaling/v2");
    }

    fn configmaps() -> APIResourceList {
        serde_yaml::from_str(indoc! {
            r#"
            groupVersion: v1
            resources:
              - name: configmaps
                singularName: configmap
                namespaced: true
                kind: ConfigMap
                verbs: [get, list, watch]
            "#
        })
        .unwrap()
    }

    fn configmaps_in_two_namespaces() -> ObjectList {
        serde_json::from_value(json!({
            "items": [
                { "metadata": { "name": "settings", "namespace": "a" } },
                { "metadata": { "name": "settings", "namespace": "b" } }
            ]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn 書き込みに失敗したオブジェクト以外は書き出す() {
        let tmp = tempfile::tempdir().unwrap();

        // namespaced/a がファイルなので a のディレクトリを作れない
        fs::create_dir_all(tmp.path().join("namespaced")).unwrap();
        fs::write(tmp.path().join("namespaced/a"), "").unwrap();

        let mut client = MockTestKubeClient::new();

        mock_expect!(
            client,
            request,
            [
                (APIVersions, eq("/api"), Ok(core_versions())),
                (
                    APIGroupList,
                    eq("/apis"),
                    Ok(serde_json::from_value(json!({ "groups": [] })).unwrap())
                ),
                (APIResourceList, eq("/api/v1"), Ok(configmaps())),
                (ObjectList, eq("/api/v1/configmaps"), Ok(configmaps_in_two_namespaces()))
            ]
        );

        let summary = Dumper::new(client, config(tmp.path()))
            .unwrap()
            .run()
            .await
            .unwrap();

        assert_eq!(summary.written, 1);
        assert_eq!(
            written_files(tmp.path()),
            BTreeSet::from([
                "namespaced/a".to_string(),
                "namespaced/b/configmaps/settings.yaml".to_string(),
            ])
        );
    }

    /// In-memory API server that records how many list calls overlap.
    #[derive(Default)]
    struct FakeServer {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FakeServer {
        const GROUPS: usize = 6;

        fn response(path: &str) -> Option<Value> {
            let value = match path {
                "/api" => json!({ "versions": ["v1"], "serverAddressByClientCIDRs": [] }),
                "/apis" => json!({
                    "groups": (0..Self::GROUPS)
                        .map(|i| json!({
                            "name": format!("group-{}.example.com", i),
                            "versions": [{ "groupVersion": format!("group-{}.example.com/v1", i), "version": "v1" }]
                        }))
                        .collect::<Vec<_>>()
                }),
                "/api/v1" => json!({ "groupVersion": "v1", "resources": [] }),
                path if path.ends_with("/v1") => json!({
                    "groupVersion": path.trim_start_matches("/apis/"),
                    "resources": [
                        { "name": "things", "singularName": "thing", "namespaced": true, "kind": "Thing", "verbs": ["list"] },
                        { "name": "globals", "singularName": "global", "namespaced": false, "kind": "Global", "verbs": ["list"] }
                    ]
                }),
                path if path.ends_with("/things") => json!({
                    "items": (0..3)
                        .map(|i| json!({ "metadata": { "name": format!("thing:{}", i), "namespace": format!("ns-{}", i % 2) } }))
                        .collect::<Vec<_>>()
                }),
                path if path.ends_with("/globals") => json!({
                    "items": [{ "metadata": { "name": "global" } }]
                }),
                _ => return None,
            };

            Some(value)
        }
    }

    #[async_trait]
    impl KubeClientRequest for FakeServer {
        async fn request<T: DeserializeOwned + Send + 'static>(&self, path: &str) -> Result<T> {
            let is_list = path.ends_with("/things") || path.ends_with("/globals");

            if is_list {
                let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_in_flight.fetch_max(current, Ordering::SeqCst);

                // 他の list が始まるまで少し待つ。同時実行数 1 のときは待ち切って進む
                for _ in 0..1000 {
                    if 1 < self.max_in_flight.load(Ordering::SeqCst) {
                        break;
                    }
                    tokio::task::yield_now().await;
                }

                self.in_flight.fetch_sub(1, Ordering::SeqCst);
            }

            let Some(value) = Self::response(path) else {
                bail!("404 page not found: {}", path);
            };

            Ok(serde_json::from_value(value)?)
        }
    }

    async fn dump_with_concurrency(max_concurrency: usize) -> (BTreeSet<String>, u64, usize) {
        let tmp = tempfile::tempdir().unwrap();

        let config = DumpConfig {
            max_concurrency,
            ..config(tmp.path())
        };

        let dumper = Dumper::new(FakeServer::default(), config).unwrap();

        let summary = dumper.run().await.unwrap();

        let max_in_flight = dumper.client.max_in_flight.load(Ordering::SeqCst);

        (written_files(tmp.path()), summary.written, max_in_flight)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn 同時実行数に関わらず同じファイルを書き出す() {
        let (serial_files, serial_written, serial_max) = dump_with_concurrency(1).await;
        let (parallel_files, parallel_written, parallel_max) = dump_with_concurrency(4).await;

        assert_eq!(serial_max, 1);
        assert!(1 < parallel_max && parallel_max <= 4);

        assert_eq!(serial_written, (FakeServer::GROUPS * 4) as u64);
        assert_eq!(serial_written, parallel_written);
        assert_eq!(serial_files, parallel_files);
        assert!(serial_files.contains("namespaced/ns-0/things.group-0.example.com/thing_0.yaml"));
        assert!(serial_files.contains("clusterscoped/globals.group-5.example.com/global.yaml"));
    }
}
