use copyverify::config::Config;
use copyverify::copy::CopyOptions;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn test_config_load_defaults() {
    // Use figment directly without Env to avoid interference from other tests
    let figment = Figment::from(Serialized::defaults(Config::default()));
    let config: Config = figment.extract().unwrap();
    assert!(!config.parallel_hashing);
    assert_eq!(config.copy, CopyOptions::default());
}

#[test]
fn test_config_load_from_env() {
    figment::Jail::expect_with(|jail| {
        jail.set_env("COPYVERIFY_PARALLEL_HASHING", "true");
        jail.set_env("COPYVERIFY_COPY__RETRIES", "9");
        jail.set_env("COPYVERIFY_CACHE_DIR", "/tmp/cv-cache");

        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::prefixed("COPYVERIFY_").split("__"))
            .extract()?;

        assert!(config.parallel_hashing);
        assert_eq!(config.copy.retries, 9);
        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/cv-cache")));
        Ok(())
    });
}

#[test]
fn test_config_load_from_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    let toml_content = r#"
cache_dir = "/srv/copyverify"
parallel_hashing = true

[copy]
program = "robocopy"
args = ["{source}", "{destination}", "/E"]
fatal_threshold = 8
self_logging = true
"#;
    fs::write(&config_path, toml_content).unwrap();

    let config = Config::load(Some(&config_path)).unwrap();

    assert_eq!(config.cache_dir, Some(PathBuf::from("/srv/copyverify")));
    assert!(config.parallel_hashing);
    assert_eq!(config.copy.program, "robocopy");
    assert_eq!(config.copy.args, vec!["{source}", "{destination}", "/E"]);
    assert_eq!(config.copy.fatal_threshold, 8);
    assert!(config.copy.self_logging);
    assert_eq!(config.storage_dir().unwrap(), PathBuf::from("/srv/copyverify"));
}

#[test]
fn test_env_overrides_toml() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            "parallel_hashing = false\n[copy]\nretries = 1\n",
        )?;
        jail.set_env("COPYVERIFY_COPY__RETRIES", "4");

        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("COPYVERIFY_").split("__"))
            .extract()?;

        assert_eq!(config.copy.retries, 4);
        assert!(!config.parallel_hashing);
        Ok(())
    });
}

#[test]
fn test_missing_config_file_uses_defaults() {
    let temp_dir = tempdir().unwrap();
    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(temp_dir.path().join("absent.toml")))
        .extract()
        .unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_config_invalid_toml_fallback() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "invalid = toml").unwrap();

    assert!(Config::load(Some(&config_path)).is_err());
}

#[test]
fn test_config_show_is_valid_toml() {
    let text = Config::default().to_toml().unwrap();
    let parsed: Config = toml::from_str(&text).unwrap();
    assert_eq!(parsed, Config::default());
}
