use starmill_job::{build_link, JobOrchestrator, JobPhase};
use starmill_settings::{JobConfig, LinkType};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(text: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

const FAST_SIMULATED: &str = r#"
[connection]
link = "simulated"
port = "sim0"

[timeouts]
batch_ms = 5000
settle_ms = 1

[simulator]
latency_ms = 1
"#;

#[test]
fn test_job_from_config_file() {
    let file = write_config(&format!(
        "{FAST_SIMULATED}\n[material]\npasses = 3\nthickness = 6.0\n\n[star]\npoints = 5\n"
    ));
    let config = JobConfig::load(file.path()).unwrap();
    assert_eq!(config.connection.link, LinkType::Simulated);

    let job = JobOrchestrator::new(config).unwrap();
    let report = job.run(build_link(job.config())).unwrap();

    let depths: Vec<f64> = report.passes.iter().map(|p| p.depth).collect();
    assert_eq!(depths, vec![4.0, 2.0, 0.0]);
    assert_eq!(report.calibration_command, "G10 L20 P0 X220 Y205 Z106.168");
}

#[test]
fn test_probe_offset_and_origin_from_config() {
    let file = write_config(&format!(
        "{FAST_SIMULATED}\nprobe_z = -98.5\n\n[calibration]\nprobe_offset = 1.5\norigin_x = 10.0\norigin_y = 12.5\n"
    ));
    let job = JobOrchestrator::new(JobConfig::load(file.path()).unwrap()).unwrap();
    let report = job.run(build_link(job.config())).unwrap();

    assert_eq!(report.measured_z, -98.5);
    assert_eq!(report.calibration_command, "G10 L20 P0 X10 Y12.5 Z100.000");
}

#[test]
fn test_simulated_no_contact_from_config() {
    let file = write_config(&format!("{FAST_SIMULATED}\nprobe_triggers = false\n"));
    let job = JobOrchestrator::new(JobConfig::load(file.path()).unwrap()).unwrap();

    let err = job.run(build_link(job.config())).unwrap_err();
    assert_eq!(err.phase, JobPhase::Probe);
}

#[test]
fn test_invalid_config_rejected_at_load() {
    let file = write_config(&format!("{FAST_SIMULATED}\n[material]\npasses = 0\n"));
    assert!(JobConfig::load(file.path()).is_err());
}
