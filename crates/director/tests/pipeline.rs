//! End-to-end runs of the director against mocked catalogs and download hosts

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use mod_director::{
    DirectorConfig, DirectorOutcome, ModpackDirector, PresetSelection, ProgressCallback, ProgressEvent, Severity,
    Side, StandalonePlatform,
};
use tempfile::{TempDir, tempdir};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

/// Collects every progress event of a run
struct ProgressCapture {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl ProgressCapture {
    fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn get_callback(&self) -> ProgressCallback {
        let events = self.events.clone();
        Arc::new(move |event: ProgressEvent| {
            events.lock().unwrap().push(event);
        })
    }

    fn messages(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::Message { message, .. } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    fn count_started(&self) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| matches!(event, ProgressEvent::Started { .. }))
            .count()
    }

    fn count_done(&self) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| matches!(event, ProgressEvent::Done { .. }))
            .count()
    }
}

struct Pack {
    root: TempDir,
}

impl Pack {
    fn new() -> Self {
        let root = tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("config/mod-director")).unwrap();
        Self { root }
    }

    fn root(&self) -> &Path {
        self.root.path()
    }

    fn mods(&self) -> PathBuf {
        self.root().join("mods")
    }

    fn config(&self, name: &str, content: &str) {
        std::fs::write(self.root().join("config/mod-director").join(name), content).unwrap();
    }

    fn existing_mod(&self, name: &str, content: &str) {
        std::fs::create_dir_all(self.mods()).unwrap();
        std::fs::write(self.mods().join(name), content).unwrap();
    }

    fn director(&self, config: DirectorConfig) -> ModpackDirector {
        self.director_on(config, Side::Client)
    }

    fn director_on(&self, config: DirectorConfig, side: Side) -> ModpackDirector {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let platform = StandalonePlatform::new(self.root()).with_side(side);
        ModpackDirector::new(Arc::new(platform), config).unwrap()
    }
}

fn offline_config() -> DirectorConfig {
    DirectorConfig::builder().without_blocklist().worker_threads(4).build()
}

async fn serve(server: &MockServer, route: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.map(|r| r.len()).unwrap_or(0)
}

fn severities(outcome: &DirectorOutcome) -> Vec<Severity> {
    outcome.errors.iter().map(|e| e.level).collect()
}

#[tokio::test]
async fn test_matching_hash_skips_download() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .expect(0)
        .mount(&server)
        .await;

    let pack = Pack::new();
    pack.existing_mod("hello.jar", "hello");
    pack.config(
        "hello.url.json",
        &format!(
            r#"{{"url": "{}/hello.jar", "metadata": {{"hash": {{"SHA-256": "{}"}}}}}}"#,
            server.uri(),
            HELLO_SHA256
        ),
    );

    let outcome = pack.director(offline_config()).run().await;

    assert!(outcome.success);
    assert!(outcome.installed.is_empty());
    assert!(outcome.errors.is_empty());
}

#[tokio::test]
async fn test_mismatched_hash_reinstalls() {
    let server = MockServer::start().await;
    serve(&server, "/hello.jar", b"hello").await;

    let pack = Pack::new();
    pack.existing_mod("hello.jar", "goodbye");
    pack.config(
        "hello.url.json",
        &format!(
            r#"{{"url": "{}/hello.jar", "metadata": {{"hash": {{"SHA-256": "{}"}}}}, "options": {{"category": "library"}}}}"#,
            server.uri(),
            HELLO_SHA256
        ),
    );

    let outcome = pack.director(offline_config()).run().await;

    assert!(outcome.success, "errors: {:?}", outcome.errors);
    assert_eq!(std::fs::read_to_string(pack.mods().join("hello.jar")).unwrap(), "hello");
    assert_eq!(outcome.installed.len(), 1);
    let installed = &outcome.installed[0];
    assert!(installed.path.ends_with("mods/hello.jar"));
    assert!(installed.inject);
    assert_eq!(installed.options["category"], serde_json::json!("library"));
}

#[tokio::test]
async fn test_follow_chain_downloads_linked_file() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/page.html",
        br#"<html><body><a class="button" href="/files/x.jar">Download Now</a></body></html>"#,
    )
    .await;
    serve(&server, "/files/x.jar", b"final bytes").await;

    let pack = Pack::new();
    pack.config(
        "x.url.json",
        &format!(
            r#"{{"url": "{}/page.html", "fileName": "x.jar", "follows": ["Download Now"]}}"#,
            server.uri()
        ),
    );

    let progress = ProgressCapture::new();
    let outcome = pack
        .director(offline_config())
        .with_progress(progress.get_callback())
        .run()
        .await;

    assert!(outcome.success, "errors: {:?}", outcome.errors);
    assert_eq!(std::fs::read(pack.mods().join("x.jar")).unwrap(), b"final bytes");
    let messages = progress.messages();
    assert!(messages.contains(&"Following redirect 1 out of 1".to_string()));
    assert!(messages.contains(&"Downloading final file".to_string()));
    assert_eq!(progress.count_started(), progress.count_done());
}

#[tokio::test]
async fn test_missing_follow_marker_aborts_descriptor() {
    let server = MockServer::start().await;
    serve(&server, "/page.html", br#"<a href="/files/x.jar">Mirror</a>"#).await;

    let pack = Pack::new();
    pack.config(
        "x.url.json",
        &format!(
            r#"{{"url": "{}/page.html", "fileName": "x.jar", "follows": ["Download Now"]}}"#,
            server.uri()
        ),
    );

    let outcome = pack.director(offline_config()).run().await;

    assert!(!outcome.success);
    assert_eq!(severities(&outcome), [Severity::Severe]);
    assert!(!pack.mods().join("x.jar").exists());
    assert!(outcome.installed.is_empty());
}

#[tokio::test]
async fn test_modify_disable_is_idempotent_across_runs() {
    let pack = Pack::new();
    pack.existing_mod("optifine.jar", "x");
    pack.config(
        "optifine.modify.json",
        r#"{"folder": "mods", "fileName": "optifine.jar", "disable": true}"#,
    );

    let first = pack.director(offline_config()).run().await;
    let second = pack.director(offline_config()).run().await;

    assert!(first.success && second.success);
    assert!(second.errors.is_empty());
    assert!(!pack.mods().join("optifine.jar").exists());
    assert!(pack.mods().join("optifine.jar.disabled-by-mod-director").is_file());
}

#[tokio::test]
async fn test_directory_failure_does_not_stop_siblings() {
    let server = MockServer::start().await;
    serve(&server, "/a.jar", b"a").await;
    serve(&server, "/b.jar", b"b").await;

    let pack = Pack::new();
    std::fs::write(pack.root().join("blocked"), "a file where a folder should be").unwrap();
    pack.config(
        "a.url.json",
        &format!(r#"{{"url": "{}/a.jar", "folder": "blocked"}}"#, server.uri()),
    );
    pack.config("b.url.json", &format!(r#"{{"url": "{}/b.jar"}}"#, server.uri()));

    let outcome = pack.director(offline_config()).run().await;

    assert!(!outcome.success);
    assert_eq!(severities(&outcome), [Severity::Severe]);
    assert_eq!(outcome.installed.len(), 1);
    assert!(outcome.installed[0].path.ends_with("mods/b.jar"));
    assert_eq!(std::fs::read(pack.mods().join("b.jar")).unwrap(), b"b");
}

#[tokio::test]
async fn test_other_side_is_never_fetched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("client"))
        .expect(0)
        .mount(&server)
        .await;

    let pack = Pack::new();
    pack.config(
        "client.url.json",
        &format!(
            r#"{{"url": "{}/client-only.jar", "metadata": {{"side": "CLIENT"}}}}"#,
            server.uri()
        ),
    );

    let outcome = pack.director_on(offline_config(), Side::Server).run().await;

    assert!(outcome.success);
    assert!(outcome.installed.is_empty());
    assert!(!pack.mods().join("client-only.jar").exists());
}

#[tokio::test]
async fn test_second_run_makes_no_requests() {
    let server = MockServer::start().await;
    serve(&server, "/a.jar", b"a").await;
    serve(&server, "/b.jar", b"b").await;

    let pack = Pack::new();
    pack.config("a.url.json", &format!(r#"{{"url": "{}/a.jar"}}"#, server.uri()));
    pack.config("b.url.json", &format!(r#"{{"url": "{}/b.jar"}}"#, server.uri()));

    let first = pack.director(offline_config()).run().await;
    assert!(first.success);
    assert_eq!(first.installed.len(), 2);
    let after_first = request_count(&server).await;

    let second = pack.director(offline_config()).run().await;
    assert!(second.success);
    assert!(second.installed.is_empty());
    assert_eq!(request_count(&server).await, after_first);
}

#[tokio::test]
async fn test_blocklisted_url_is_fatal_despite_policy() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/sites.json",
        br#"[{"domain": "reposts.example", "reason": "Reposting mods", "notes": "Use the official page"}]"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/reposts.example/mod.jar"))
        .respond_with(ResponseTemplate::new(200).set_body_string("stolen"))
        .expect(0)
        .mount(&server)
        .await;

    let pack = Pack::new();
    pack.config(
        "stolen.url.json",
        &format!(
            r#"{{"url": "{}/reposts.example/mod.jar", "installationPolicy": {{"continueOnFailedDownload": true}}}}"#,
            server.uri()
        ),
    );

    let config = DirectorConfig::builder()
        .blocklist_url(format!("{}/sites.json", server.uri()))
        .build();
    let outcome = pack.director(config).run().await;

    assert!(!outcome.success);
    assert_eq!(severities(&outcome), [Severity::Severe]);
    assert!(!pack.mods().join("mod.jar").exists());
}

#[tokio::test]
async fn test_declined_option_is_marked_and_not_offered_again() {
    let server = MockServer::start().await;
    serve(&server, "/core.jar", b"core").await;
    serve(&server, "/shaders.jar", b"shaders").await;

    let pack = Pack::new();
    pack.config("core.url.json", &format!(r#"{{"url": "{}/core.jar"}}"#, server.uri()));
    pack.config(
        "shaders.url.json",
        &format!(
            r#"{{"url": "{}/shaders.jar", "installationPolicy": {{"optionalKey": "shaders", "name": "Shaders"}}}}"#,
            server.uri()
        ),
    );

    let declined = PresetSelection::new(HashMap::from([("shaders".to_string(), false)]));
    let outcome = pack.director(offline_config()).with_selection(declined).run().await;

    assert!(outcome.success);
    assert_eq!(outcome.installed.len(), 1);
    assert!(!pack.mods().join("shaders.jar").exists());
    assert!(pack.mods().join("shaders.jar.disabled-by-mod-director").is_file());

    let accepted = PresetSelection::new(HashMap::from([("shaders".to_string(), true)]));
    let rerun = pack.director(offline_config()).with_selection(accepted).run().await;
    assert!(rerun.installed.is_empty());
    assert!(!pack.mods().join("shaders.jar").exists());
}

#[tokio::test]
async fn test_catalog_backends() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cf/mods/100/files/200"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"{{"data": {{"displayName": "Curse Mod", "fileName": "curse-mod.jar", "downloadUrl": "{}/dl/curse-mod.jar"}}}}"#,
            server.uri()
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/version/ver1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"{{"files": [{{"filename": "modrinth-mod.jar", "url": "{}/dl/modrinth-mod.jar"}}]}}"#,
            server.uri()
        )))
        .mount(&server)
        .await;
    serve(&server, "/dl/curse-mod.jar", b"curse").await;
    serve(&server, "/dl/modrinth-mod.jar", b"modrinth").await;

    let pack = Pack::new();
    pack.config(
        "mods.bundle.json",
        r#"{
            "curse": [{"addonId": 100, "fileId": 200}],
            "modrinth": [{"versionId": "ver1", "folder": "extra"}]
        }"#,
    );

    let config = DirectorConfig::builder()
        .without_blocklist()
        .curse_api_url(format!("{}/cf", server.uri()))
        .modrinth_api_url(format!("{}/v2", server.uri()))
        .build();
    let outcome = pack.director(config).run().await;

    assert!(outcome.success, "errors: {:?}", outcome.errors);
    assert_eq!(std::fs::read(pack.mods().join("curse-mod.jar")).unwrap(), b"curse");
    assert_eq!(
        std::fs::read(pack.root().join("extra/modrinth-mod.jar")).unwrap(),
        b"modrinth"
    );
    let injected: Vec<_> = outcome.installed.iter().filter(|m| m.inject).collect();
    assert_eq!(injected.len(), 1);
}

#[tokio::test]
async fn test_extract_and_delete_archive() {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    writer
        .start_file("options.txt", zip::write::SimpleFileOptions::default())
        .unwrap();
    writer.write_all(b"fov:90").unwrap();
    let archive = writer.finish().unwrap().into_inner();

    let server = MockServer::start().await;
    serve(&server, "/defaults.zip", &archive).await;

    let pack = Pack::new();
    std::fs::write(pack.root().join("options.txt"), "fov:70").unwrap();
    pack.config(
        "defaults.url.json",
        &format!(
            r#"{{"url": "{}/defaults.zip", "folder": ".", "installationPolicy": {{"extract": true, "deleteAfterExtract": true}}}}"#,
            server.uri()
        ),
    );

    let outcome = pack.director(offline_config()).run().await;

    assert!(outcome.success, "errors: {:?}", outcome.errors);
    assert_eq!(std::fs::read_to_string(pack.root().join("options.txt")).unwrap(), "fov:90");
    assert_eq!(
        std::fs::read_to_string(pack.root().join("options.txt.disabled-by-mod-director")).unwrap(),
        "fov:70"
    );
    assert!(!pack.root().join("defaults.zip").exists());
    assert_eq!(outcome.installed.len(), 1);
    assert_eq!(outcome.installed[0].path, pack.root());
}

#[tokio::test]
async fn test_outdated_modpack_refuses_launch() {
    let server = MockServer::start().await;
    serve(&server, "/version.txt", b"2.0.0\n").await;
    serve(&server, "/new.jar", b"new").await;

    let pack = Pack::new();
    pack.config(
        "modpack.json",
        &format!(
            r#"{{"packName": "Test Pack", "localVersion": "1.0.0", "remoteVersion": "{}/version.txt", "refuseLaunch": true, "requiresRestart": true}}"#,
            server.uri()
        ),
    );
    pack.config(
        "new.url.json",
        &format!(
            r#"{{"url": "{}/new.jar", "installationPolicy": {{"modpackVersion": "2.0.0"}}}}"#,
            server.uri()
        ),
    );

    let outcome = pack.director(offline_config()).run().await;

    assert_eq!(outcome.pack_name, "Test Pack");
    assert!(outcome.outdated);
    assert!(outcome.refuse_launch);
    assert!(!outcome.success);
    assert!(outcome.restart_required);
    assert!(pack.mods().join("new.jar").is_file());
}

#[tokio::test]
async fn test_version_mismatch_excludes_descriptor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("old"))
        .expect(0)
        .mount(&server)
        .await;

    let pack = Pack::new();
    pack.config(
        "modpack.json",
        r#"{"packName": "Test Pack", "localVersion": "3.0"}"#,
    );
    pack.config(
        "old.url.json",
        &format!(
            r#"{{"url": "{}/old.jar", "installationPolicy": {{"modpackVersion": "2.0"}}}}"#,
            server.uri()
        ),
    );

    let outcome = pack.director(offline_config()).run().await;

    assert!(outcome.success);
    assert!(!outcome.outdated);
    assert!(outcome.installed.is_empty());
}

#[tokio::test]
async fn test_each_run_starts_with_a_clean_error_sink() {
    let server = MockServer::start().await;

    let pack = Pack::new();
    pack.config("x.url.json", &format!(r#"{{"url": "{}/x.jar"}}"#, server.uri()));
    let director = pack.director(offline_config());

    let first = director.run().await;
    assert!(!first.success);
    assert_eq!(severities(&first), [Severity::Severe]);

    serve(&server, "/x.jar", b"fixed").await;
    let second = director.run().await;

    assert!(second.success, "errors: {:?}", second.errors);
    assert!(second.errors.is_empty());
    assert_eq!(second.installed.len(), 1);
    assert_eq!(std::fs::read(pack.mods().join("x.jar")).unwrap(), b"fixed");
}

#[tokio::test]
async fn test_unsupported_hash_algorithm_installs_without_verification() {
    let server = MockServer::start().await;
    serve(&server, "/fresh.jar", b"fresh").await;
    Mock::given(method("GET"))
        .and(path("/present.jar"))
        .respond_with(ResponseTemplate::new(200).set_body_string("replacement"))
        .expect(0)
        .mount(&server)
        .await;

    let pack = Pack::new();
    pack.existing_mod("present.jar", "already here");
    for name in ["fresh", "present"] {
        pack.config(
            &format!("{}.url.json", name),
            &format!(
                r#"{{"url": "{}/{}.jar", "metadata": {{"hash": {{"whirlpool": "0123"}}}}}}"#,
                server.uri(),
                name
            ),
        );
    }

    let outcome = pack.director(offline_config()).run().await;

    assert!(outcome.success, "errors: {:?}", outcome.errors);
    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.installed.len(), 1);
    assert!(outcome.installed[0].path.ends_with("mods/fresh.jar"));
    assert_eq!(std::fs::read(pack.mods().join("fresh.jar")).unwrap(), b"fresh");
    assert_eq!(
        std::fs::read_to_string(pack.mods().join("present.jar")).unwrap(),
        "already here"
    );
}

#[tokio::test]
async fn test_failed_supersede_is_a_warning() {
    let server = MockServer::start().await;
    serve(&server, "/new.jar", b"new").await;

    let pack = Pack::new();
    pack.existing_mod("old.jar", "old");
    let blocking = pack.mods().join("old.jar.disabled-by-mod-director");
    std::fs::create_dir_all(&blocking).unwrap();
    std::fs::write(blocking.join("keep.txt"), "occupied").unwrap();
    pack.config(
        "new.url.json",
        &format!(
            r#"{{"url": "{}/new.jar", "installationPolicy": {{"supersede": "old.jar"}}}}"#,
            server.uri()
        ),
    );

    let outcome = pack.director(offline_config()).run().await;

    assert!(outcome.success, "errors: {:?}", outcome.errors);
    assert_eq!(severities(&outcome), [Severity::Warning]);
    assert!(pack.mods().join("old.jar").is_file());
    assert_eq!(std::fs::read(pack.mods().join("new.jar")).unwrap(), b"new");
}

#[tokio::test]
async fn test_follow_link_without_leading_slash_resolves_from_origin() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/pages/download.html",
        br#"<a href="files/y.jar">Download Now</a>"#,
    )
    .await;
    serve(&server, "/files/y.jar", b"origin relative").await;

    let pack = Pack::new();
    pack.config(
        "y.url.json",
        &format!(
            r#"{{"url": "{}/pages/download.html", "fileName": "y.jar", "follows": ["Download Now"]}}"#,
            server.uri()
        ),
    );

    let outcome = pack.director(offline_config()).run().await;

    assert!(outcome.success, "errors: {:?}", outcome.errors);
    assert_eq!(std::fs::read(pack.mods().join("y.jar")).unwrap(), b"origin relative");
}
