mod common;
use common::*;
use aurora_bridge::prelude::*;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

const FULL: &str = r#"
inverter:
  host: 192.168.1.140
  port: 8899
  address: 3
  read_delay_ms: 100
  connect_timeout_ms: 2500
  read_timeout_ms: 4000
  use_tcp_nodelay: false
scheduler:
  interval: 30
  offset: 5
backoff: 120
operations: [gridPowerAll, dailyEnergy, getTime]
loglevel: debug
output:
  console: true
  csv: /var/log/aurora/aurora_%Y-%m-%d.csv
  json: stdout
  http:
    url: http://pvoutput.local/aurora
    field: sample
  mqtt:
    host: localhost
    username: aurora
    password: secret
"#;

fn config_file(content: &str) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(content.as_bytes())?;
    Ok(file)
}

#[test]
fn reads_full_config() -> Result<()> {
    common_setup();

    let file = config_file(FULL)?;
    let config = Config::new(file.path().to_str().unwrap())?;

    let inverter = config.inverter();
    assert_eq!(inverter.host(), "192.168.1.140");
    assert_eq!(inverter.port(), 8899);
    assert_eq!(inverter.address(), 3);
    assert_eq!(inverter.read_delay(), Duration::from_millis(100));
    assert_eq!(inverter.connect_timeout(), Some(Duration::from_millis(2500)));
    assert_eq!(inverter.read_timeout(), Duration::from_millis(4000));
    assert!(!inverter.use_tcp_nodelay());

    assert_eq!(config.scheduler().interval(), 30);
    assert_eq!(config.scheduler().offset(), 5);
    assert!(!config.scheduler().once());
    assert_eq!(config.backoff(), Duration::from_secs(120));
    assert_eq!(config.operations(), ["gridPowerAll", "dailyEnergy", "getTime"]);
    assert_eq!(config.loglevel(), "debug");

    let output = config.output();
    assert!(output.console());
    assert_eq!(output.csv(), Some("/var/log/aurora/aurora_%Y-%m-%d.csv"));
    assert_eq!(output.json(), Some("stdout"));
    assert_eq!(output.http().unwrap().field(), Some("sample"));

    let mqtt = output.mqtt().unwrap();
    assert_eq!(mqtt.port(), 1883);
    assert_eq!(mqtt.topic(), "aurora/sample");
    assert_eq!(mqtt.username(), Some("aurora"));

    Ok(())
}

#[test]
fn interval_zero_means_once() -> Result<()> {
    let config = Config::parse("inverter:\n  host: h\nscheduler:\n  interval: 0\n")?;
    assert!(config.scheduler().once());
    Ok(())
}

#[test]
fn rejects_unknown_operation() {
    let err = Config::parse("inverter:\n  host: h\noperations: [gridPowerAll, gridPowerAl]\n")
        .unwrap_err();
    assert!(
        matches!(err.downcast_ref::<Error>(), Some(Error::UnknownOperation(n)) if n == "gridPowerAl"),
        "{:#}",
        err
    );
}

#[test]
fn rejects_bad_values() {
    for yaml in [
        "inverter:\n  host: ''\n",
        "inverter:\n  host: h\n  port: 0\n",
        "inverter:\n  host: h\n  address: 64\n",
        "inverter:\n  host: h\n  read_timeout_ms: 0\n",
        "inverter:\n  host: h\nscheduler:\n  interval: 10\n  offset: 10\n",
        "inverter:\n  host: h\nscheduler:\n  interval: 18446744073709551615\n",
        "inverter:\n  host: h\nscheduler:\n  interval: 604801\n",
        "inverter:\n  host: h\noperations: []\n",
        "inverter:\n  host: h\noutput:\n  http:\n    url: nope\n",
        "inverter:\n  host: h\noutput:\n  mqtt:\n    host: m\n    username: u\n",
        "scheduler:\n  interval: 10\n",
    ] {
        assert!(Config::parse(yaml).is_err(), "accepted {:?}", yaml);
    }
}

#[test]
fn missing_file_is_an_error() {
    let err = Config::new("/nonexistent/aurora.yaml").unwrap_err();
    assert!(err.to_string().contains("/nonexistent/aurora.yaml"));
}
