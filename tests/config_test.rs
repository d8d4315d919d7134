//! Config discovery from the working directory.

use mediaconv::config::{load_config_or_default, Config};
use serial_test::serial;
use std::path::PathBuf;

struct CwdGuard(PathBuf);

impl CwdGuard {
    fn enter(dir: &std::path::Path) -> Self {
        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir).unwrap();
        Self(previous)
    }
}

impl Drop for CwdGuard {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.0);
    }
}

#[test]
#[serial]
fn local_config_file_is_discovered() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("mediaconv.toml"),
        "[conversion]\nworkers = 3\nweb_optimized_quality = 70\n",
    )
    .unwrap();

    let _guard = CwdGuard::enter(dir.path());
    let config = load_config_or_default(None).unwrap();
    assert_eq!(config.conversion.workers, 3);
    assert_eq!(config.conversion.web_optimized_quality, 70);
    assert_eq!(config.conversion.default_quality, 90);
}

#[test]
#[serial]
fn invalid_local_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("mediaconv.toml"), "[conversion]\ndefault_effort = 7\n").unwrap();

    let _guard = CwdGuard::enter(dir.path());
    let err = load_config_or_default(None).unwrap_err();
    assert!(err.to_string().contains("default_effort"));
}

#[test]
fn config_round_trips_through_toml() {
    let mut config = Config::default();
    config.presets.insert("banner".to_string(), [1500, 500]);
    config.tools.ffmpeg_path = Some(PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));

    let text = toml::to_string(&config).unwrap();
    let parsed: Config = toml::from_str(&text).unwrap();
    assert_eq!(parsed.presets.get("banner"), Some(&[1500, 500]));
    assert_eq!(parsed.tools.ffmpeg_path, config.tools.ffmpeg_path);
    assert_eq!(parsed.conversion.workers, config.conversion.workers);
}
