//! End-to-end migration runs against an in-memory platform.

mod common;

use std::fs;

use tokio_util::sync::CancellationToken;

use common::{files_under, old_url, Fixture, MemoryPlatform, CATEGORY};
use webhook_migrator::report::{GUIDE_FILE, JSON_FILE};
use webhook_migrator::{MemorySink, MigratorError, Pipeline, RunReport, SilentSink, LOCK_FILE};

fn shop_fixture() -> Fixture {
    let fixture = Fixture::new();
    let url = old_url(1);
    fixture.write(
        "resources/shop/config.lua",
        &format!("Config = {{}}\nConfig.Webhook = \"{}\"\n", url),
    );
    fixture.write(
        "resources/shop/alerts.lua",
        &format!("local webhook = '{}'\nprint('ready')\n", url),
    );
    fixture.write("resources/shop/fxmanifest.lua", "fx_version 'cerulean'\n");
    fixture
}

// ============================================================================
// Full runs
// ============================================================================

#[tokio::test]
async fn test_end_to_end_shared_url_in_one_resource() {
    let fixture = shop_fixture();
    let config = fixture.config();
    let platform = MemoryPlatform::new();
    let sink = MemorySink::new();

    let report = Pipeline::new(&config, &sink)
        .run(&platform, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(platform.channel_names(), vec!["shop-logs"]);
    assert_eq!(platform.endpoints_created(), 1);

    let stats = &report.statistics;
    assert_eq!(stats.files_scanned, 3);
    assert_eq!(stats.files_with_matches, 2);
    assert_eq!(stats.resources_found, 1);
    assert_eq!(stats.channels_created, 1);
    assert_eq!(stats.endpoints_created, 1);
    assert_eq!(stats.files_updated, 2);
    assert_eq!(stats.replacements, 2);
    assert_eq!(stats.files_backed_up, 2);

    let new_url = report.mappings[0].new_url.to_string();
    for file in ["resources/shop/config.lua", "resources/shop/alerts.lua"] {
        let content = fixture.read(file);
        assert!(!content.contains(&old_url(1)));
        assert!(content.contains(&new_url));
    }
    assert_eq!(
        fixture.read("resources/shop/alerts.lua"),
        format!("local webhook = '{}'\nprint('ready')\n", new_url)
    );

    let backups = files_under(&fixture.backup_root());
    assert_eq!(backups.len(), 2);
    for backup in &backups {
        assert!(fs::read_to_string(backup).unwrap().contains(&old_url(1)));
    }

    let json = fs::read_to_string(fixture.output_dir().join(JSON_FILE)).unwrap();
    let saved: RunReport = serde_json::from_str(&json).unwrap();
    assert_eq!(saved.mappings.len(), 1);
    assert_eq!(saved.mappings[0].resource, "shop");
    let guide = fs::read_to_string(fixture.output_dir().join(GUIDE_FILE)).unwrap();
    assert!(guide.contains("CHANNEL: #shop-logs"));

    assert!(!fixture.root.path().join(LOCK_FILE).exists());
    assert!(sink.messages().iter().any(|m| m.contains("Step 4/4")));
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let fixture = shop_fixture();
    let config = fixture.config();
    let platform = MemoryPlatform::new();
    let sink = SilentSink;
    let cancel = CancellationToken::new();

    Pipeline::new(&config, &sink).run(&platform, &cancel).await.unwrap();
    let after_first = fixture.read("resources/shop/config.lua");

    let report = Pipeline::new(&config, &sink).run(&platform, &cancel).await.unwrap();

    assert_eq!(platform.channels_created(), 1);
    assert_eq!(platform.endpoints_created(), 1);
    assert_eq!(report.statistics.channels_created, 0);
    assert_eq!(report.statistics.channels_reused, 1);
    assert_eq!(report.statistics.endpoints_created, 0);
    assert_eq!(report.statistics.already_migrated, 1);
    assert_eq!(report.statistics.files_updated, 0);
    assert_eq!(fixture.read("resources/shop/config.lua"), after_first);
}

#[tokio::test]
async fn test_text_around_url_in_quoted_value_is_kept() {
    let fixture = Fixture::new();
    let url = old_url(1);
    let config_lua = format!("Config.Webhook = \" {}\"\n", url);
    let alerts_lua = format!("webhook = \"Discord: {}\"\n", url);
    fixture.write("resources/shop/config.lua", &config_lua);
    fixture.write("resources/shop/alerts.lua", &alerts_lua);

    let config = fixture.config();
    let platform = MemoryPlatform::new();
    let sink = SilentSink;
    let report = Pipeline::new(&config, &sink)
        .run(&platform, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(platform.endpoints_created(), 1);
    assert_eq!(report.mappings.len(), 1);
    assert_eq!(report.statistics.webhooks_found, 2);
    assert_eq!(report.statistics.replacements, 2);

    let new_url = report.mappings[0].new_url.to_string();
    assert_eq!(
        fixture.read("resources/shop/config.lua"),
        config_lua.replace(&url, &new_url)
    );
    assert_eq!(
        fixture.read("resources/shop/alerts.lua"),
        alerts_lua.replace(&url, &new_url)
    );
}

// ============================================================================
// Failures and refusals
// ============================================================================

#[tokio::test]
async fn test_missing_category_aborts_before_any_change() {
    let fixture = shop_fixture();
    let config = fixture.config();
    let platform = MemoryPlatform::without_category();

    let result = Pipeline::new(&config, &SilentSink)
        .run(&platform, &CancellationToken::new())
        .await;

    match result {
        Err(MigratorError::ContainerNotFound(id)) => assert_eq!(id, CATEGORY),
        other => panic!("expected ContainerNotFound, got {:?}", other.map(|r| r.statistics)),
    }
    assert_eq!(platform.channels_created(), 0);
    assert!(fixture.read("resources/shop/config.lua").contains(&old_url(1)));
    assert!(!fixture.root.path().join(LOCK_FILE).exists());
}

#[tokio::test]
async fn test_failed_resource_does_not_stop_others() {
    let fixture = shop_fixture();
    fixture.write(
        "[qb]/bank/server.lua",
        &format!("Config.WebhookURL = \"{}\"\n", old_url(2)),
    );
    let config = fixture.config();
    let platform = MemoryPlatform::failing_on("bank-logs");

    let report = Pipeline::new(&config, &SilentSink)
        .run(&platform, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].resource, "bank");
    assert!(report.failures[0].reason.contains("403"));
    assert_eq!(report.statistics.files_updated, 2);
    assert!(fixture.read("[qb]/bank/server.lua").contains(&old_url(2)));
    assert!(!fixture.read("resources/shop/config.lua").contains(&old_url(1)));
}

#[tokio::test]
async fn test_url_shared_between_resources_gets_one_endpoint_each() {
    let fixture = Fixture::new();
    let url = old_url(7);
    fixture.write("resources/alpha/a.lua", &format!("webhook = \"{}\"\n", url));
    fixture.write("resources/beta/b.lua", &format!("webhook = \"{}\"\n", url));
    let config = fixture.config();
    let platform = MemoryPlatform::new();

    let report = Pipeline::new(&config, &SilentSink)
        .run(&platform, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(platform.channel_names(), vec!["alpha-logs", "beta-logs"]);
    assert_eq!(report.mappings.len(), 2);
    let alpha = fixture.read("resources/alpha/a.lua");
    let beta = fixture.read("resources/beta/b.lua");
    assert_ne!(alpha, beta);
    assert!(alpha.contains(report.mappings[0].new_url.as_str()));
    assert!(beta.contains(report.mappings[1].new_url.as_str()));
}

#[tokio::test]
async fn test_without_backups_files_are_still_rewritten() {
    let fixture = shop_fixture();
    let mut settings = fixture.settings();
    settings.create_backups = false;
    let config = fixture.config_with(settings);
    let platform = MemoryPlatform::new();

    let report = Pipeline::new(&config, &SilentSink)
        .run(&platform, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.statistics.files_updated, 2);
    assert_eq!(report.statistics.files_backed_up, 0);
    assert!(report.backup_dir.is_none());
    assert!(!fixture.backup_root().exists());
}

#[tokio::test]
async fn test_locked_root_is_refused() {
    let fixture = shop_fixture();
    fs::write(fixture.root.path().join(LOCK_FILE), "1").unwrap();
    let config = fixture.config();
    let platform = MemoryPlatform::new();

    let result = Pipeline::new(&config, &SilentSink)
        .run(&platform, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(MigratorError::RunLocked(_))));
    assert_eq!(platform.channels_created(), 0);
    assert!(fixture.root.path().join(LOCK_FILE).exists());
}

#[tokio::test]
async fn test_empty_tree_writes_empty_report() {
    let fixture = Fixture::new();
    fixture.write("resources/shop/config.lua", "Config = {}\n");
    let config = fixture.config();
    let platform = MemoryPlatform::new();
    let sink = MemorySink::new();

    let report = Pipeline::new(&config, &sink)
        .run(&platform, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.statistics.webhooks_found, 0);
    assert!(report.mappings.is_empty());
    assert_eq!(platform.channels_created(), 0);
    assert!(fixture.output_dir().join(JSON_FILE).exists());
    assert!(sink.messages().iter().any(|m| m == "No webhooks found"));
}

#[tokio::test]
async fn test_cancelled_before_start_touches_nothing_remote() {
    let fixture = shop_fixture();
    let config = fixture.config();
    let platform = MemoryPlatform::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = Pipeline::new(&config, &SilentSink)
        .run(&platform, &cancel)
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(platform.channels_created(), 0);
    assert!(fixture.read("resources/shop/config.lua").contains(&old_url(1)));
}

#[tokio::test]
async fn test_invalid_config_reports_every_problem() {
    let config = webhook_migrator::Config::new(
        "/definitely/not/here",
        webhook_migrator::Credentials {
            bot_token: String::new(),
            guild_id: "abc".to_string(),
            category_id: String::new(),
        },
        webhook_migrator::Settings::default(),
    );
    let platform = MemoryPlatform::new();

    let result = Pipeline::new(&config, &SilentSink)
        .run(&platform, &CancellationToken::new())
        .await;

    match result {
        Err(MigratorError::Config(errors)) => {
            assert_eq!(errors.len(), 4);
            assert!(errors.iter().any(|e| e.contains("does not exist")));
            assert!(errors.iter().any(|e| e.contains("DISCORD_BOT_TOKEN")));
            assert!(errors.iter().any(|e| e.contains("numeric")));
            assert!(errors.iter().any(|e| e.contains("QB_LOGS_CATEGORY_ID")));
        }
        other => panic!("expected Config error, got {:?}", other.map(|r| r.statistics)),
    }
}

// ============================================================================
// Scan only
// ============================================================================

#[test]
fn test_scan_only_lists_resources_without_writing() {
    let fixture = shop_fixture();
    fixture.write("[qb]/bank/server.lua", &format!("webhook = '{}'\n", old_url(2)));
    let config = fixture.config();

    let outcome = Pipeline::new(&config, &SilentSink)
        .scan_only(&CancellationToken::new())
        .unwrap();

    let resources: Vec<&str> = outcome.by_resource.keys().map(String::as_str).collect();
    assert_eq!(resources, vec!["bank", "shop"]);
    assert_eq!(outcome.distinct_urls(), 2);
    assert_eq!(outcome.occurrences.values().map(Vec::len).sum::<usize>(), 3);
    assert!(!fixture.output_dir().exists());
    assert!(!fixture.root.path().join(LOCK_FILE).exists());
}
