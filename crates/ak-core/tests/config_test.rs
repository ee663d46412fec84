use std::time::Duration;

use ak_core::config::{Cadence, Config, Step};
use ak_core::types::Point;

#[test]
fn default_config() {
    let cfg = Config::default();
    assert_eq!(cfg.general.log_level, "info");
    assert_eq!(cfg.general.log_format, "pretty");
    assert_eq!(cfg.game.package_name, "com.lilithgame.roc.gp");
    assert_eq!(cfg.timing.selection_settle_secs, 3);
    assert_eq!(cfg.timing.load_max_wait_secs, 30);
    assert_eq!(cfg.recovery.max_attempts, 5);
    assert_eq!(cfg.character_grid.slots_per_page, 6);
    assert!(cfg.instances.is_empty());
    cfg.validate().expect("default config validates");
}

#[test]
fn default_automations_cover_daily_and_every_cycle() {
    let cfg = Config::default();
    let names: Vec<_> = cfg.automations.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, ["build", "expedition", "donation"]);
    assert_eq!(cfg.automations[0].cadence, Cadence::Daily);
    assert_eq!(cfg.automations[2].cadence, Cadence::EveryCycle);
    assert!(matches!(cfg.automations[0].steps[0], Step::NavigateToMap));
}

#[test]
fn retry_section_converts() {
    let cfg = Config::default();
    let retry = cfg.retry.to_retry_config();
    assert_eq!(retry.max_retries, 2);
    assert!(retry.recover_to_home);
    assert_eq!(retry.delay_between_retries, Duration::from_secs(2));
    assert_eq!(retry.max_attempts(), 3);
}

#[test]
fn config_roundtrip() {
    let cfg = Config::default();
    let toml_str = cfg.to_toml().expect("serialize to toml");
    assert!(toml_str.contains("com.lilithgame.roc.gp"));

    let parsed: Config = toml::from_str(&toml_str).expect("parse toml back");
    assert_eq!(parsed.automations, cfg.automations);
    assert_eq!(parsed.timing.post_load_buffer_secs, cfg.timing.post_load_buffer_secs);
    assert_eq!(parsed.character_grid.first_page, cfg.character_grid.first_page);
    parsed.validate().expect("config validates");
}

#[test]
fn config_partial_toml() {
    let partial = r#"
[general]
log_level = "debug"

[retry]
max_retries = 4

[[instances]]
id = "main"
adb_serial = "127.0.0.1:5555"
entity_count = 10
"#;
    let cfg: Config = toml::from_str(partial).expect("parse partial");
    assert_eq!(cfg.general.log_level, "debug");
    assert_eq!(cfg.retry.max_retries, 4);
    assert!(cfg.retry.recover_to_home);
    // defaults fill in the rest
    assert_eq!(cfg.automations.len(), 3);
    let inst = cfg.instance("main").expect("instance present");
    assert_eq!(inst.entity_count, 10);
    assert_eq!(inst.start_index, 0);
    assert!(inst.exit_after_complete);
    assert!(inst.enabled);
    assert_eq!(inst.display_name(), "main");
    cfg.validate().expect("config validates");
}

#[test]
fn scripted_steps_parse() {
    let text = r#"
[[automations]]
name = "gather"
cadence = "every_cycle"

[[automations.steps]]
action = "click"
point = { x = 10, y = 20 }
times = 3

[[automations.steps]]
action = "tap_text"
keywords = ["Gather"]
region = { x = 0, y = 0, width = 100, height = 50 }
required = false

[[automations.steps]]
action = "dismiss"
"#;
    let cfg: Config = toml::from_str(text).expect("parse automations");
    assert_eq!(cfg.automations.len(), 1);
    let steps = &cfg.automations[0].steps;
    assert_eq!(
        steps[0],
        Step::Click {
            point: Point::new(10, 20),
            times: 3,
            delay_ms: None
        }
    );
    assert!(matches!(steps[1], Step::TapText { required: false, offset: None, .. }));
    assert_eq!(steps[2], Step::Dismiss { count: 1 });
}

#[test]
fn duplicate_instance_ids_fail_validation() {
    let text = r#"
[[instances]]
id = "a"
adb_serial = "127.0.0.1:5555"

[[instances]]
id = "a"
adb_serial = "127.0.0.1:5565"
"#;
    let cfg: Config = toml::from_str(text).expect("parse");
    let err = cfg.validate().expect_err("validation should fail");
    assert!(err.to_string().contains("duplicate instance id"));
}

#[test]
fn empty_automation_fails_validation() {
    let mut cfg = Config::default();
    cfg.automations[1].steps.clear();
    let err = cfg.validate().expect_err("validation should fail");
    assert!(err.to_string().contains("expedition"));
}

#[test]
fn zero_recovery_attempts_fail_validation() {
    let mut cfg = Config::default();
    cfg.recovery.max_attempts = 0;
    assert!(cfg.validate().is_err());
}

#[test]
fn load_from_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[game]\ngame_load_wait_secs = 45\n").expect("write");
    let cfg = Config::load_from(&path).expect("load");
    assert_eq!(cfg.game.game_load_wait_secs, 45);

    std::fs::write(&path, "[game\n").expect("write");
    let err = Config::load_from(&path).expect_err("bad toml");
    assert!(err.to_string().starts_with("parse"));
}
