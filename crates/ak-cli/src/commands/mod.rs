pub mod instances;
pub mod reset;
pub mod run;
pub mod schedule;
pub mod status;

use std::path::Path;

use ak_core::config::{Config, InstanceConfig};
use anyhow::Context;

/// Load the config from `path`, or the default location.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(p) => Config::load_from(p).with_context(|| format!("failed to load {}", p.display())),
        None => Config::load().context("failed to load config"),
    }
}

/// Look up an instance by id with a friendly error listing what exists.
pub fn find_instance<'a>(config: &'a Config, id: &str) -> anyhow::Result<&'a InstanceConfig> {
    config.instance(id).with_context(|| {
        let known: Vec<&str> = config.instances.iter().map(|i| i.id.as_str()).collect();
        if known.is_empty() {
            format!("unknown instance '{id}' (no instances configured)")
        } else {
            format!("unknown instance '{id}' (configured: {})", known.join(", "))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_instance_lists_configured_ids() {
        let mut config = Config::default();
        config.instances.push(InstanceConfig::new("alpha", "127.0.0.1:5555", 4));
        config.instances.push(InstanceConfig::new("beta", "127.0.0.1:5565", 2));

        assert_eq!(find_instance(&config, "beta").unwrap().entity_count, 2);
        let err = find_instance(&config, "gamma").unwrap_err().to_string();
        assert!(err.contains("configured: alpha, beta"), "{err}");
    }

    #[test]
    fn unknown_instance_with_empty_config() {
        let err = find_instance(&Config::default(), "x").unwrap_err().to_string();
        assert!(err.contains("no instances configured"));
    }

    #[test]
    fn explicit_config_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[[instances]]\nid = \"main\"\nadb_serial = \"127.0.0.1:5555\"\nentity_count = 3\n",
        )
        .unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.instances.len(), 1);
        assert!(load_config(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
