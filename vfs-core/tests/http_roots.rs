mod common;

use std::sync::Arc;

use common::{FakeServer, gzip, names};
use vfs_core::{
    FileSystemOperator, StorageRoot, VfsError,
    backends::auth_proxy::StaticTokenProvider,
    cache::DirectoryCache,
    config::AuthConfig,
};

const BASE: &str = "https://files.example.org/sims";

const NGINX_SCENARIO: &str = r#"<html>
<head><title>Index of /sims/data/scenarioA/</title></head>
<body>
<h1>Index of /sims/data/scenarioA/</h1><hr><pre><a href="../">../</a>
<a href="output/">output/</a>                                            12-Jan-2024 09:30       -
<a href="run10/">run10/</a>                                             12-Jan-2024 09:30       -
<a href="run2/">run2/</a>                                              12-Jan-2024 09:30       -
<a href="viz-map.yaml">viz-map.yaml</a>                                  12-Jan-2024 09:30     812
</pre><hr></body>
</html>
"#;

fn http_operator(server: &FakeServer, cache: DirectoryCache) -> FileSystemOperator {
    FileSystemOperator::new(
        StorageRoot::generic_http("public", BASE),
        Arc::new(server.clone()),
        cache,
        &AuthConfig::default(),
    )
}

#[tokio::test]
async fn nginx_listing_end_to_end() {
    let server = FakeServer::new();
    server.serve(&format!("{BASE}/data/scenarioA/"), 200, NGINX_SCENARIO);
    let op = http_operator(&server, DirectoryCache::new());

    let entry = op.list_directory("data//scenarioA").await.unwrap();

    assert_eq!(entry.dirs, names(&["output", "run2", "run10"]));
    assert_eq!(entry.files, names(&["viz-map.yaml"]));
    assert!(
        entry
            .dirs
            .iter()
            .chain(&entry.files)
            .all(|n| !n.contains('/'))
    );
}

#[tokio::test]
async fn repeated_listing_hits_the_server_once() {
    let server = FakeServer::new();
    let url = format!("{BASE}/data/scenarioA/");
    server.serve(&url, 200, NGINX_SCENARIO);
    let op = http_operator(&server, DirectoryCache::new());

    let first = op.list_directory("/data/scenarioA/").await.unwrap();
    let second = op.list_directory("/data/./scenarioA").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(server.hits_for(&url), 1);

    let stats = op.cache_stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.loads, 1);
}

#[tokio::test]
async fn invalidation_is_per_root() {
    let server = FakeServer::new();
    let url = format!("{BASE}/data/scenarioA/");
    server.serve(&url, 200, NGINX_SCENARIO);

    let shared = DirectoryCache::new();
    let public = http_operator(&server, shared.clone());
    let mirror = FileSystemOperator::new(
        StorageRoot::generic_http("mirror", BASE),
        Arc::new(server.clone()),
        shared,
        &AuthConfig::default(),
    );

    public.list_directory("/data/scenarioA/").await.unwrap();
    mirror.list_directory("/data/scenarioA/").await.unwrap();
    assert_eq!(server.hits_for(&url), 2);

    public.invalidate_cache();
    public.list_directory("/data/scenarioA/").await.unwrap();
    mirror.list_directory("/data/scenarioA/").await.unwrap();
    assert_eq!(server.hits_for(&url), 3);
}

#[tokio::test]
async fn failed_listing_is_wrapped_and_retried() {
    let server = FakeServer::new();
    let op = http_operator(&server, DirectoryCache::new());

    let err = op.list_directory("/missing/").await.unwrap_err();
    assert!(matches!(err, VfsError::Listing { .. }));
    assert_eq!(err.http_status(), Some(404));

    server.serve(&format!("{BASE}/missing/"), 200, NGINX_SCENARIO);
    assert!(!op.list_directory("/missing/").await.unwrap().is_empty());
}

#[tokio::test]
async fn json_survives_double_gzip() {
    let server = FakeServer::new();
    let payload = gzip(&gzip(br#"{"links": 1532, "mode": "car"}"#));
    server.serve(&format!("{BASE}/out/summary.json.gz"), 200, payload);
    let op = http_operator(&server, DirectoryCache::new());

    let value = op.read_file_as_json("/out/summary.json.gz").await.unwrap();
    assert_eq!(value["links"], 1532);
    assert_eq!(value["mode"], "car");
}

#[tokio::test]
async fn typed_json_read() {
    #[derive(serde::Deserialize)]
    struct Summary {
        links: u32,
    }

    let server = FakeServer::new();
    server.serve(&format!("{BASE}/summary.json"), 200, r#"{"links": 7}"#);
    let op = http_operator(&server, DirectoryCache::new());

    let s: Summary = op.read_file_as_json_typed("summary.json").await.unwrap();
    assert_eq!(s.links, 7);
}

#[tokio::test]
async fn config_discovery_over_http() {
    let server = FakeServer::new();
    server.serve(
        &format!("{BASE}/"),
        200,
        "<html><body><pre>\n<a href=\"simwrapper/\">simwrapper/</a>\n<a href=\"runs/\">runs/</a>\n</pre></body></html>\n",
    );
    server.serve(
        &format!("{BASE}/simwrapper/"),
        200,
        "<html><body><pre>\n<a href=\"dashboard-1.yaml\">dashboard-1.yaml</a>\n<a href=\"topsheet-1.yaml\">topsheet-1.yaml</a>\n</pre></body></html>\n",
    );
    server.serve(
        &format!("{BASE}/runs/"),
        200,
        "<html><body><pre>\n<a href=\"dashboard-1.yaml\">dashboard-1.yaml</a>\n</pre></body></html>\n",
    );
    let op = http_operator(&server, DirectoryCache::new());

    let found = op.find_all_yaml_files("/runs").await.unwrap();
    assert_eq!(found.dashboards["dashboard-1.yaml"], "/runs/dashboard-1.yaml");
    assert_eq!(found.topsheets["topsheet-1.yaml"], "/simwrapper/topsheet-1.yaml");
}

#[tokio::test]
async fn proxy_root_reads_with_injected_token() {
    let server = FakeServer::new();
    let proxy = "https://proxy.example.org/bucket";
    server.serve(&format!("{proxy}/runs/base/output_trips.csv"), 200, "trip_id,mode\n1,bike\n");

    let tokens = Arc::new(StaticTokenProvider::new(Some("t".into()), Some("u".into())));
    let op = FileSystemOperator::new(
        StorageRoot::authenticated_proxy("bucket", proxy, tokens),
        Arc::new(server.clone()),
        DirectoryCache::new(),
        &AuthConfig::default(),
    );

    let text = op.read_file_as_text("/runs/base/output_trips.csv").await.unwrap();
    assert!(text.starts_with("trip_id"));
}
