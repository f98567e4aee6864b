use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use chrono::Utc;
use flate2::read::GzDecoder;
use keel_build::{
    AppParams, FormationGenerator, IgnoreError, IgnoreRules, IndexError, TarballError,
    TemplateError, TransferError, create_index, create_tarball, hash_bytes, pack_missing,
    warn_unignored_env,
};
use keel_core::{Index, ReleaseRecord, StackParameter};
use proptest::prelude::*;
use tempfile::TempDir;

/// Write `files` (relative path, content) under `root`, creating parents.
fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (rel, content) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }
}

struct TarEntry {
    name: String,
    mode: u32,
    data: Vec<u8>,
}

fn read_tar_gz(bytes: &[u8]) -> Vec<TarEntry> {
    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    archive
        .entries()
        .unwrap()
        .map(|e| {
            let mut e = e.unwrap();
            let name = e.path().unwrap().to_string_lossy().trim_end_matches('/').to_owned();
            let mode = e.header().mode().unwrap();
            let mut data = Vec::new();
            e.read_to_end(&mut data).unwrap();
            TarEntry { name, mode, data }
        })
        .collect()
}

fn names(entries: &[TarEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.name.as_str()).collect()
}

fn index_of(dir: &Path) -> Index {
    let rules = IgnoreRules::load(dir, ".dockerignore").unwrap();
    create_index(dir, &rules).unwrap()
}

fn tarball_of(dir: &Path) -> Vec<u8> {
    let rules = IgnoreRules::load(dir, ".dockerignore").unwrap();
    create_tarball(dir, &rules, ".dockerignore", "Dockerfile").unwrap()
}

fn rules(content: &str) -> IgnoreRules {
    IgnoreRules::parse(Path::new(".dockerignore"), content).unwrap()
}

// ── Ignore Rule Tests ──

#[test]
fn ignore_skips_comments_and_blank_lines() {
    let r = rules("# build output\n\n   \ntarget\n");
    assert!(r.matches("target"));
    assert!(!r.matches("# build output"));
}

#[test]
fn ignore_single_star_stays_in_one_segment() {
    let r = rules("*.log");
    assert!(r.matches("debug.log"));
    assert!(!r.matches("logs/debug.log"));
}

#[test]
fn ignore_double_star_spans_directories() {
    let r = rules("**/*.log");
    assert!(r.matches("debug.log"));
    assert!(r.matches("a/b/c/debug.log"));
    assert!(!r.matches("a/b/c/debug.txt"));
}

#[test]
fn ignore_directory_pattern_covers_contents() {
    let r = rules("node_modules\n/tmp/");
    assert!(r.matches("node_modules"));
    assert!(r.matches("node_modules/left-pad/index.js"));
    assert!(r.matches("tmp/cache/blob"));
    assert!(!r.matches("src/node_modules.rs"));
}

#[test]
fn ignore_last_match_wins_with_negation() {
    let r = rules("*.md\n!README.md");
    assert!(r.matches("CHANGELOG.md"));
    assert!(!r.matches("README.md"));

    let reversed = rules("!README.md\n*.md");
    assert!(reversed.matches("README.md"));
}

#[test]
fn ignore_character_classes_and_single_char() {
    let r = rules("file[0-9].txt\nlog?.txt\nx[!ab].bin");
    assert!(r.matches("file7.txt"));
    assert!(!r.matches("filex.txt"));
    assert!(r.matches("log1.txt"));
    assert!(!r.matches("log12.txt"));
    assert!(r.matches("xc.bin"));
    assert!(!r.matches("xa.bin"));
}

#[test]
fn ignore_unterminated_class_reports_line() {
    let result = IgnoreRules::parse(Path::new(".dockerignore"), "target\n\nsrc/[abc\n");
    match result {
        Err(IgnoreError::Pattern { line, pattern, .. }) => {
            assert_eq!(line, 3);
            assert_eq!(pattern, "src/[abc");
        }
        other => panic!("expected pattern error, got {other:?}"),
    }
}

#[test]
fn ignore_bare_negation_is_rejected() {
    let result = IgnoreRules::parse(Path::new(".dockerignore"), "!\n");
    assert!(matches!(result, Err(IgnoreError::Pattern { line: 1, .. })));
}

#[test]
fn ignore_prunes_only_without_negations() {
    assert!(rules("vendor").prunes_dir("vendor"));
    assert!(!rules("vendor\n!vendor/keep").prunes_dir("vendor"));
}

#[test]
fn ignore_missing_file_ignores_nothing() {
    let tmp = TempDir::new().unwrap();
    let r = IgnoreRules::load(tmp.path(), ".dockerignore").unwrap();
    assert!(r.is_empty());
    assert!(!r.matches("anything"));
}

#[test]
fn env_warning_fires_only_for_unignored_env() {
    let tmp = TempDir::new().unwrap();
    assert!(!warn_unignored_env(tmp.path(), &IgnoreRules::default()));

    write_tree(tmp.path(), &[(".env", "SECRET=1")]);
    assert!(warn_unignored_env(tmp.path(), &IgnoreRules::default()));
    assert!(!warn_unignored_env(tmp.path(), &rules(".env")));
}

// ── Content Index Tests ──

#[test]
fn index_dedups_identical_content() {
    let tmp = TempDir::new().unwrap();
    write_tree(
        tmp.path(),
        &[
            ("a/config.yml", "same bytes"),
            ("b/config.yml", "same bytes"),
            ("main.rb", "puts 1"),
        ],
    );

    let index = index_of(tmp.path());

    assert_eq!(index.len(), 2);
    let shared = index.get(&hash_bytes(b"same bytes")).unwrap();
    assert!(shared.path == "a/config.yml" || shared.path == "b/config.yml");
    assert_eq!(shared.size, 10);
}

#[test]
fn index_honors_ignore_rules_and_skips_directories() {
    let tmp = TempDir::new().unwrap();
    write_tree(
        tmp.path(),
        &[
            (".dockerignore", "log\n*.tmp\n"),
            ("log/app.log", "noise"),
            ("scratch.tmp", "noise2"),
            ("src/app.rb", "code"),
        ],
    );
    std::fs::create_dir(tmp.path().join("empty")).unwrap();

    let index = index_of(tmp.path());
    let mut paths: Vec<_> = index.entries().map(|e| e.path.clone()).collect();
    paths.sort();

    assert_eq!(paths, vec![".dockerignore", "src/app.rb"]);
}

#[test]
fn index_entry_hash_is_content_hash() {
    let tmp = TempDir::new().unwrap();
    write_tree(tmp.path(), &[("Dockerfile", "FROM ruby\n")]);

    let index = index_of(tmp.path());
    let entry = index.entries().next().unwrap();

    assert_eq!(entry.hash, hash_bytes(b"FROM ruby\n"));
    assert_eq!(entry.hash.len(), 64);
    assert_eq!(entry.path, "Dockerfile");
    assert!(entry.modified <= Utc::now());
}

#[test]
fn bad_ignore_file_fails_before_any_walk() {
    let tmp = TempDir::new().unwrap();
    write_tree(tmp.path(), &[(".dockerignore", "[unterminated\n")]);

    let result = IgnoreRules::load(tmp.path(), ".dockerignore");
    assert!(matches!(result, Err(IgnoreError::Pattern { line: 1, .. })));
}

#[test]
fn index_applies_given_rules_not_the_file_on_disk() {
    let tmp = TempDir::new().unwrap();
    write_tree(
        tmp.path(),
        &[(".dockerignore", "notes.txt\n"), ("notes.txt", "n"), ("app.rb", "a")],
    );

    let index = create_index(tmp.path(), &rules("app.rb\n")).unwrap();
    let mut paths: Vec<_> = index.entries().map(|e| e.path.clone()).collect();
    paths.sort();

    assert_eq!(paths, vec![".dockerignore", "notes.txt"]);
}

#[test]
fn index_fails_on_missing_root() {
    let tmp = TempDir::new().unwrap();
    let result = create_index(&tmp.path().join("nope"), &IgnoreRules::default());
    assert!(matches!(result, Err(IndexError::Resolve { .. })));
}

#[cfg(unix)]
#[test]
fn index_reads_through_symlinked_files() {
    let tmp = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    write_tree(tmp.path(), &[("Dockerfile", "FROM golang")]);
    write_tree(outside.path(), &[("shared.go", "package shared")]);
    std::os::unix::fs::symlink(outside.path().join("shared.go"), tmp.path().join("shared.go"))
        .unwrap();

    let index = index_of(tmp.path());
    let mut paths: Vec<_> = index.entries().map(|e| e.path.clone()).collect();
    paths.sort();

    assert_eq!(paths, vec!["Dockerfile", "shared.go"]);
    let shared = index.get(&hash_bytes(b"package shared")).unwrap();
    assert_eq!(shared.size, 14);

    let packed = read_tar_gz(&pack_missing(&index, &[shared.hash.clone()]).unwrap());
    assert_eq!(packed[0].data, b"package shared");
}

#[cfg(unix)]
#[test]
fn index_fails_on_dangling_symlink() {
    let tmp = TempDir::new().unwrap();
    write_tree(tmp.path(), &[("Dockerfile", "FROM golang")]);
    std::os::unix::fs::symlink(tmp.path().join("gone.go"), tmp.path().join("link.go")).unwrap();

    let result = create_index(tmp.path(), &IgnoreRules::default());
    assert!(
        matches!(result, Err(IndexError::Read { ref path, .. }) if path.ends_with("link.go"))
    );
}

#[cfg(unix)]
#[test]
fn index_skips_ignored_symlinks_and_links_to_directories() {
    let tmp = TempDir::new().unwrap();
    write_tree(
        tmp.path(),
        &[(".dockerignore", "broken.go\n"), ("lib/util.go", "package lib")],
    );
    std::os::unix::fs::symlink(tmp.path().join("gone.go"), tmp.path().join("broken.go")).unwrap();
    std::os::unix::fs::symlink(tmp.path().join("lib"), tmp.path().join("vendor")).unwrap();

    let index = index_of(tmp.path());
    let mut paths: Vec<_> = index.entries().map(|e| e.path.clone()).collect();
    paths.sort();

    assert_eq!(paths, vec![".dockerignore", "lib/util.go"]);
}

#[cfg(unix)]
#[test]
fn index_paths_stable_through_symlinked_root() {
    let tmp = TempDir::new().unwrap();
    let real = tmp.path().join("real");
    write_tree(&real, &[("src/app.rb", "code")]);
    let link = tmp.path().join("link");
    std::os::unix::fs::symlink(&real, &link).unwrap();

    let direct = index_of(&real);
    let via_link = index_of(&link);

    assert_eq!(direct.root(), via_link.root());
    assert_eq!(direct.wire(), via_link.wire());
}

#[cfg(unix)]
#[test]
fn index_records_file_mode() {
    use std::os::unix::fs::PermissionsExt;

    let tmp = TempDir::new().unwrap();
    write_tree(tmp.path(), &[("bin/run", "#!/bin/sh\n")]);
    std::fs::set_permissions(
        tmp.path().join("bin/run"),
        std::fs::Permissions::from_mode(0o755),
    )
    .unwrap();

    let index = index_of(tmp.path());
    assert_eq!(index.entries().next().unwrap().mode, 0o755);
}

#[test]
fn index_of_empty_tree_is_empty() {
    let tmp = TempDir::new().unwrap();
    let index = index_of(tmp.path());
    assert!(index.is_empty());
    assert!(index.hashes().is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn same_bytes_at_different_paths_share_one_entry(content in proptest::collection::vec(any::<u8>(), 0..512)) {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("nested/deeper")).unwrap();
        std::fs::write(tmp.path().join("one.bin"), &content).unwrap();
        std::fs::write(tmp.path().join("nested/deeper/two.bin"), &content).unwrap();

        let index = index_of(tmp.path());

        prop_assert_eq!(index.len(), 1);
        prop_assert_eq!(index.hashes(), vec![hash_bytes(&content)]);
    }
}

// ── Missing Archive Tests ──

#[test]
fn pack_missing_names_entries_by_hash() {
    let tmp = TempDir::new().unwrap();
    write_tree(
        tmp.path(),
        &[("app.rb", "puts 1"), ("lib/util.rb", "def util; end")],
    );
    let index = index_of(tmp.path());
    let wanted = hash_bytes(b"def util; end");

    let bytes = pack_missing(&index, std::slice::from_ref(&wanted)).unwrap();
    let entries = read_tar_gz(&bytes);

    assert_eq!(names(&entries), vec![wanted.as_str()]);
    assert_eq!(entries[0].data, b"def util; end");
    assert_eq!(entries[0].mode, 0o600);
}

#[test]
fn pack_missing_rejects_hash_not_in_index() {
    let tmp = TempDir::new().unwrap();
    let index = index_of(tmp.path());

    let result = pack_missing(&index, &["deadbeef".to_owned()]);
    assert!(matches!(result, Err(TransferError::UnknownHash { ref hash }) if hash == "deadbeef"));
}

#[test]
fn pack_missing_fails_when_file_vanished() {
    let tmp = TempDir::new().unwrap();
    write_tree(tmp.path(), &[("gone.txt", "here today")]);
    let index = index_of(tmp.path());
    std::fs::remove_file(tmp.path().join("gone.txt")).unwrap();

    let result = pack_missing(&index, &index.hashes());
    assert!(matches!(result, Err(TransferError::Read { .. })));
}

// ── Tarball Tests ──

#[test]
fn tarball_contains_filtered_tree() {
    let tmp = TempDir::new().unwrap();
    write_tree(
        tmp.path(),
        &[
            (".dockerignore", "tmp\n*.log\n"),
            ("Dockerfile", "FROM ruby"),
            ("app.rb", "puts 1"),
            ("debug.log", "noise"),
            ("tmp/cache/blob", "noise"),
            ("lib/util.rb", "util"),
        ],
    );

    let bytes = tarball_of(tmp.path());
    let entries = read_tar_gz(&bytes);
    let listed = names(&entries);

    assert!(listed.contains(&"app.rb"));
    assert!(listed.contains(&"lib"));
    assert!(listed.contains(&"lib/util.rb"));
    assert!(!listed.contains(&"debug.log"));
    assert!(!listed.iter().any(|n| n.starts_with("tmp")));
}

#[test]
fn tarball_force_includes_ignore_and_build_files() {
    let tmp = TempDir::new().unwrap();
    write_tree(
        tmp.path(),
        &[
            (".dockerignore", ".dockerignore\nDockerfile\nsecret.txt\n"),
            ("Dockerfile", "FROM ruby"),
            ("secret.txt", "hunter2"),
        ],
    );

    let bytes = tarball_of(tmp.path());
    let entries = read_tar_gz(&bytes);
    let listed = names(&entries);

    assert!(listed.contains(&".dockerignore"));
    assert!(listed.contains(&"Dockerfile"));
    assert!(!listed.contains(&"secret.txt"));
}

#[test]
fn tarball_negation_reincludes_below_excluded_dir() {
    let tmp = TempDir::new().unwrap();
    write_tree(
        tmp.path(),
        &[
            (".dockerignore", "vendor\n!vendor/keep.rb\n"),
            ("vendor/keep.rb", "keep"),
            ("vendor/drop.rb", "drop"),
        ],
    );

    let bytes = tarball_of(tmp.path());
    let entries = read_tar_gz(&bytes);
    let listed = names(&entries);

    assert!(listed.contains(&"vendor/keep.rb"));
    assert!(!listed.contains(&"vendor/drop.rb"));
}

#[test]
fn tarball_preserves_file_content() {
    let tmp = TempDir::new().unwrap();
    write_tree(tmp.path(), &[("Procfile", "web: bundle exec puma")]);

    let bytes = tarball_of(tmp.path());
    let entries = read_tar_gz(&bytes);

    let procfile = entries.iter().find(|e| e.name == "Procfile").unwrap();
    assert_eq!(procfile.data, b"web: bundle exec puma");
}

#[test]
fn tarball_fails_on_missing_root() {
    let tmp = TempDir::new().unwrap();

    let result = create_tarball(
        &tmp.path().join("nope"),
        &IgnoreRules::default(),
        ".dockerignore",
        "Dockerfile",
    );
    assert!(matches!(result, Err(TarballError::Resolve { .. })));
}

#[cfg(unix)]
#[test]
fn tarball_archives_symlinks_as_links() {
    let tmp = TempDir::new().unwrap();
    write_tree(tmp.path(), &[("Dockerfile", "FROM golang"), ("real.go", "package main")]);
    std::os::unix::fs::symlink("real.go", tmp.path().join("alias.go")).unwrap();

    let bytes = tarball_of(tmp.path());
    let mut archive = tar::Archive::new(GzDecoder::new(bytes.as_slice()));
    let alias = archive
        .entries()
        .unwrap()
        .map(Result::unwrap)
        .find(|e| e.path().unwrap().to_string_lossy() == "alias.go")
        .unwrap();

    assert_eq!(alias.header().entry_type(), tar::EntryType::Symlink);
    assert_eq!(alias.link_name().unwrap().unwrap().to_string_lossy(), "real.go");
}

// ── Template Tests ──

fn release(manifest: Option<&str>, artifact: Option<&str>) -> ReleaseRecord {
    let mut params = BTreeMap::new();
    if let Some(m) = manifest {
        params.insert("manifest".to_owned(), m.to_owned());
    }
    ReleaseRecord {
        id: "RABCDEFGHI".to_owned(),
        app: "web".to_owned(),
        artifact: artifact.map(str::to_owned),
        created: Utc::now(),
        params,
    }
}

fn app_params() -> AppParams {
    AppParams {
        rack: "production".to_owned(),
        app: "web".to_owned(),
        parameters: vec![StackParameter::new("InstanceType", "t2.small")],
    }
}

#[test]
fn template_declares_live_parameters_and_release() {
    let release = release(None, Some("ami-x"));
    let params = app_params();
    let rendered = FormationGenerator::new(&params, &release).render().unwrap();
    let doc: serde_json::Value = serde_json::from_str(&rendered).unwrap();

    assert_eq!(doc["Parameters"]["InstanceType"]["Type"], "String");
    assert_eq!(doc["Parameters"]["Release"]["Type"], "String");
    assert!(doc["Resources"]["ReleaseHandle"].is_object());
    assert!(doc["Description"].as_str().unwrap().contains("production"));
}

#[test]
fn template_renders_one_launch_configuration_per_service() {
    let manifest = "version: '2'\nservices:\n  web:\n    build: .\n  queue-worker:\n    build: .\n";
    let release = release(Some(manifest), Some("ami-x"));
    let params = app_params();
    let rendered = FormationGenerator::new(&params, &release).render().unwrap();
    let doc: serde_json::Value = serde_json::from_str(&rendered).unwrap();

    let web = &doc["Resources"]["WebLaunchConfiguration"];
    assert_eq!(web["Properties"]["ImageId"], "ami-x");
    assert_eq!(web["Properties"]["InstanceType"]["Ref"], "InstanceType");
    assert!(doc["Resources"]["QueueWorkerLaunchConfiguration"].is_object());
}

#[test]
fn template_reads_v1_manifest_layout() {
    let services = keel_build::template::manifest_services("web:\n  build: .\nredis:\n  image: redis\n")
        .unwrap();
    assert_eq!(services, vec!["web", "redis"]);
}

#[test]
fn template_requires_artifact() {
    let release = release(None, None);
    let params = app_params();
    let result = FormationGenerator::new(&params, &release).render();
    assert!(matches!(result, Err(TemplateError::MissingArtifact { .. })));
}

#[test]
fn template_rejects_unreadable_manifest() {
    let release = release(Some("services: [unclosed"), Some("ami-x"));
    let params = app_params();
    let result = FormationGenerator::new(&params, &release).render();
    assert!(matches!(result, Err(TemplateError::Manifest { .. })));
}

#[test]
fn template_rejects_services_sharing_a_resource_name() {
    let manifest = "services:\n  web-worker:\n    build: .\n  web_worker:\n    build: .\n";
    let release = release(Some(manifest), Some("ami-x"));
    let params = app_params();

    let result = FormationGenerator::new(&params, &release).render();

    match result {
        Err(TemplateError::ResourceCollision {
            resource,
            first,
            second,
            ..
        }) => {
            assert_eq!(resource, "WebWorkerLaunchConfiguration");
            assert_eq!(first, "web-worker");
            assert_eq!(second, "web_worker");
        }
        other => panic!("expected a resource collision, got {other:?}"),
    }
}
