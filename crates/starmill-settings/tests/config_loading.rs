use starmill_settings::{ConfigError, JobConfig, LinkType, SettingsError};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_temp(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_toml_file() {
    let file = write_temp(
        ".toml",
        r#"
        [connection]
        link = "serial"
        port = "/dev/tty.usbmodem1411"

        [timeouts]
        settle_ms = 250

        [feeds]
        spindle_rpm = 12000.0
        "#,
    );

    let config = JobConfig::load(file.path()).unwrap();
    assert_eq!(config.connection.link, LinkType::Serial);
    assert_eq!(config.connection.port, "/dev/tty.usbmodem1411");
    assert_eq!(config.timeouts.settle_ms, 250);
    assert_eq!(config.feeds.spindle_rpm, 12000.0);
    assert_eq!(config.feeds.cut_rate, 1117.6);
}

#[test]
fn test_load_json_file() {
    let file = write_temp(
        ".json",
        r#"{ "connection": { "link": "simulated" }, "simulator": { "probe_z": -50.5 } }"#,
    );

    let config = JobConfig::load(file.path()).unwrap();
    assert_eq!(config.connection.link, LinkType::Simulated);
    assert_eq!(config.simulator.probe_z, -50.5);
}

#[test]
fn test_unsupported_extension() {
    let file = write_temp(".yaml", "connection: {}");
    let err = JobConfig::load(file.path()).unwrap_err();
    assert!(matches!(
        err,
        SettingsError::Config(ConfigError::UnsupportedFormat(ref ext)) if ext == "yaml"
    ));
}

#[test]
fn test_missing_file() {
    let err = JobConfig::load("/nonexistent/starmill.toml").unwrap_err();
    assert!(matches!(err, SettingsError::LoadError { .. }));
}

#[test]
fn test_invalid_values_rejected_on_load() {
    let file = write_temp(".toml", "[star]\npoints = 2\n");
    let err = JobConfig::load(file.path()).unwrap_err();
    assert!(matches!(
        err,
        SettingsError::Config(ConfigError::ValueOutOfRange { .. })
    ));
}

#[test]
fn test_malformed_toml() {
    let file = write_temp(".toml", "[material\npasses = 3");
    let err = JobConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, SettingsError::TomlError(_)));
}
