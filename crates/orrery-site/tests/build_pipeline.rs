//! End-to-end build cycles over a temporary project.

use std::fs;
use std::path::Path;

use orrery_config::{Config, EntityType};
use orrery_ledger::{FileLedgerStore, LedgerStore};
use orrery_site::{BackupManager, BuildOrchestrator, Manifest, PageConfigBuilder};
use pretty_assertions::assert_eq;

fn project(dir: &Path) -> Config {
    let config = Config::default_with_base(dir);
    fs::create_dir_all(&config.source_resolved.dir).unwrap();
    config
}

fn write_source(config: &Config, name: &str, content: &str) {
    let path = config.source_resolved.dir.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn seed(config: &Config) {
    write_source(config, "a.html", "<title>Alpha</title>\n<p>root</p>\n");
    write_source(
        config,
        "b.html",
        "<meta name=\"orrery:parent\" content=\"a\">\n<h1>Beta</h1>\n",
    );
    write_source(config, "guides/c.md", "---\nparent: b\ntags: how-to\n---\n# Gamma\n");
}

fn read_manifest(config: &Config) -> Manifest {
    let json = fs::read_to_string(&config.output_resolved.manifest_path).unwrap();
    serde_json::from_str(&json).unwrap()
}

#[test]
fn test_second_run_on_unchanged_input_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let config = project(tmp.path());
    seed(&config);
    let orchestrator = BuildOrchestrator::from_config(&config);

    let first = orchestrator.run_once().unwrap();
    let manifest_before = fs::read(&config.output_resolved.manifest_path).unwrap();
    let second = orchestrator.run_once().unwrap();
    let manifest_after = fs::read(&config.output_resolved.manifest_path).unwrap();

    assert_eq!(first.changed, 3);
    assert_eq!(first.rendered, 3);
    assert_eq!(second.changed, 0);
    assert_eq!(second.rendered, 0);
    assert_eq!(manifest_before, manifest_after);
}

#[test]
fn test_ledger_tracks_every_document() {
    let tmp = tempfile::tempdir().unwrap();
    let config = project(tmp.path());
    seed(&config);

    let report = BuildOrchestrator::from_config(&config).run_once().unwrap();

    assert_eq!(report.changed, 3);
    let ledger = FileLedgerStore::new(config.ledger_path()).load().unwrap().unwrap();
    let keys: Vec<&str> = ledger.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["a.html", "b.html", "guides/c.md"]);

    // a fresh orchestrator picks the ledger up from disk
    let report = BuildOrchestrator::from_config(&config).run_once().unwrap();
    assert_eq!(report.changed, 0);
}

#[test]
fn test_modified_document_is_only_change() {
    let tmp = tempfile::tempdir().unwrap();
    let config = project(tmp.path());
    seed(&config);
    let orchestrator = BuildOrchestrator::from_config(&config);
    orchestrator.run_once().unwrap();

    write_source(
        &config,
        "b.html",
        "<meta name=\"orrery:parent\" content=\"a\">\n<h1>Beta, revised</h1>\n",
    );
    let report = orchestrator.run_once().unwrap();

    assert_eq!(report.changed, 1);
    let manifest = read_manifest(&config);
    assert_eq!(manifest.pages[1].title, "Beta, revised");
}

#[test]
fn test_backup_retention() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = project(tmp.path());
    config.build.max_backup_count = 2;
    seed(&config);
    let orchestrator = BuildOrchestrator::from_config(&config);

    let first = orchestrator.run_once().unwrap();
    orchestrator.run_once().unwrap();
    let third = orchestrator.run_once().unwrap();

    let backups = BackupManager::new(config.backup_dir()).list().unwrap();
    assert_eq!(backups.len(), 2);
    assert_eq!(third.backups_pruned, 1);
    assert!(!first.backup_path.exists());
    assert!(backups.contains(&third.backup_path));
    let snapshot = BackupManager::load(&third.backup_path).unwrap();
    assert_eq!(snapshot.manifest, read_manifest(&config));
}

#[test]
fn test_hierarchy_and_statistics_in_manifest() {
    let tmp = tempfile::tempdir().unwrap();
    let config = project(tmp.path());
    seed(&config);
    write_source(&config, "d.html", "<meta name=\"orrery:parent\" content=\"nowhere\">");

    let report = BuildOrchestrator::from_config(&config).run_once().unwrap();
    let manifest = read_manifest(&config);

    let levels: Vec<&str> = manifest.pages.iter().map(|p| p.level.as_str()).collect();
    assert_eq!(levels, vec!["a", "b", "d", "c"]);
    assert_eq!(manifest.pages[0].children, vec!["b"]);
    assert_eq!(manifest.pages[1].children, vec!["c"]);
    assert_eq!(manifest.pages[2].parent, "");
    assert!(manifest.pages[2].validation_errors[0].starts_with("orphan parent"));
    assert_eq!(manifest.pages[3].url, "c.html");
    assert_eq!(manifest.statistics.total, 4);
    assert_eq!(manifest.statistics.with_errors, 1);
    assert_eq!(report.pages_with_errors, 1);
}

#[test]
fn test_separate_projects_assign_same_layout() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    let a = project(first.path());
    let b = project(second.path());
    for config in [&a, &b] {
        seed(config);
        for i in 0..6 {
            write_source(config, &format!("extra-{i}.html"), "<p>x</p>");
        }
        BuildOrchestrator::from_config(config).run_once().unwrap();
    }

    let layout = |config: &Config| -> Vec<(EntityType, String)> {
        read_manifest(config)
            .pages
            .into_iter()
            .map(|p| (p.entity_type, p.level))
            .collect()
    };
    assert_eq!(layout(&a), layout(&b));

    let html_a = fs::read_to_string(a.output_resolved.dir.join("extra-3.html")).unwrap();
    let html_b = fs::read_to_string(b.output_resolved.dir.join("extra-3.html")).unwrap();
    let strip = |html: &str| -> String {
        html.lines()
            .filter(|l| !l.contains("orrery:created"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    assert_eq!(strip(&html_a), strip(&html_b));
}

#[test]
fn test_rendered_output_is_valid_input() {
    let tmp = tempfile::tempdir().unwrap();
    let config = project(tmp.path());
    seed(&config);
    BuildOrchestrator::from_config(&config).run_once().unwrap();

    let html = fs::read_to_string(config.output_resolved.dir.join("b.html")).unwrap();
    let original = read_manifest(&config).pages[1].clone();
    let builder = PageConfigBuilder::new(config.types_resolved.clone(), &config.layout);
    let reparsed = builder.build("b.html", &html, 0, 1);

    assert_eq!(reparsed.level, original.level);
    assert_eq!(reparsed.title, original.title);
    assert_eq!(reparsed.entity_type, original.entity_type);
    assert_eq!(reparsed.parent, original.parent);
    assert_eq!(reparsed.importance, original.importance);
    assert_eq!(reparsed.metadata.tags, original.metadata.tags);
}
