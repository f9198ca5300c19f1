use starmill_communication::{SimulatedLink, SimulatorConfig, SimulatorHistory};
use starmill_core::{Error, ProbeError, SequencerError};
use starmill_job::{build_link, JobOrchestrator, JobPhase};
use starmill_settings::{JobConfig, LinkType};
use std::time::Duration;

fn fast_config() -> JobConfig {
    let mut config = JobConfig::default();
    config.connection.link = LinkType::Simulated;
    config.timeouts.connect_ms = 5_000;
    config.timeouts.homing_ms = 5_000;
    config.timeouts.batch_ms = 5_000;
    config.timeouts.abort_ms = 5_000;
    config.timeouts.settle_ms = 1;
    config.simulator.latency_ms = 1;
    config
}

fn simulated(config: SimulatorConfig) -> (Box<SimulatedLink>, SimulatorHistory) {
    let link = SimulatedLink::new(SimulatorConfig {
        latency: Duration::from_millis(1),
        ..config
    });
    let history = link.history();
    (Box::new(link), history)
}

#[test]
fn test_full_job_on_simulated_machine() {
    let job = JobOrchestrator::new(fast_config()).unwrap();
    let (link, history) = simulated(SimulatorConfig::default());

    let report = job.run(link).unwrap();

    assert_eq!(report.measured_z, -105.123);
    assert_eq!(report.calibration_command, "G10 L20 P0 X220 Y205 Z106.168");
    assert_eq!(report.passes.len(), 7);
    assert!((report.passes[0].depth - 2.721).abs() < 0.0005);
    assert_eq!(report.passes[6].depth, 0.0);
    assert_eq!(report.batches_issued, 28);

    assert_eq!(history.homing_requests(), 1);
    assert_eq!((history.opens(), history.closes()), (1, 1));

    let labels = history.labels();
    assert_eq!(
        &labels[..6],
        &[
            "coarse probe",
            "fine probe",
            "retract",
            "calibrate",
            "spindle start",
            "safe start"
        ]
    );
    assert_eq!(labels.last().map(String::as_str), Some("shutdown"));
}

#[test]
fn test_wire_lines_in_order() {
    let job = JobOrchestrator::new(fast_config()).unwrap();
    let (link, history) = simulated(SimulatorConfig::default());
    job.run(link).unwrap();

    let lines = history.lines();
    let position = |needle: &str| {
        lines
            .iter()
            .position(|l| l == needle)
            .unwrap_or_else(|| panic!("missing line {needle}"))
    };

    let fine_probe = position("G38.2Z-182.675F200.0");
    let calibrate = position("G10 L20 P0 X220 Y205 Z106.168");
    let first_cut = lines.iter().position(|l| l.starts_with("G1 X")).unwrap();
    assert!(fine_probe < calibrate);
    assert!(calibrate < first_cut);

    assert!(position("M3 S9000") < position("G0 X150.000 Y100.000 Z4.175"));
    assert!(position("G1 Z2.721 F355.600") < position("G1 Z0.000 F355.600"));
    assert_eq!(lines.iter().filter(|l| *l == "F1117.600").count(), 7);
    assert_eq!(lines.iter().filter(|l| l.starts_with("G1 X")).count(), 7 * 19);
    assert_eq!(&lines[lines.len() - 3..], &["M5", "$H", "M30"]);
}

#[test]
fn test_report_serializes() {
    let job = JobOrchestrator::new(fast_config()).unwrap();
    let report = job.run(build_link(job.config())).unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["calibration_command"], "G10 L20 P0 X220 Y205 Z106.168");
    assert_eq!(json["passes"].as_array().map(Vec::len), Some(7));
}

#[test]
fn test_probe_without_contact_aborts() {
    let job = JobOrchestrator::new(fast_config()).unwrap();
    let (link, history) = simulated(SimulatorConfig {
        probe_triggers: false,
        ..Default::default()
    });

    let err = job.run(link).unwrap_err();
    assert_eq!(err.phase(), JobPhase::Probe);
    assert!(err.to_string().contains("ALARM:5"));

    let labels = history.labels();
    assert_eq!(labels, vec!["coarse probe", "abort shutdown"]);
    assert!(!history.lines().iter().any(|l| l.starts_with("G10 L20")));
    assert_eq!(history.closes(), 1);
}

#[test]
fn test_missing_probe_result_aborts() {
    let job = JobOrchestrator::new(fast_config()).unwrap();
    let (link, history) = simulated(SimulatorConfig {
        report_probe: false,
        ..Default::default()
    });

    let err = job.run(link).unwrap_err();
    assert_eq!(err.phase(), JobPhase::Probe);
    assert!(matches!(err.source, Error::Probe(ProbeError::Missing)));
    assert_eq!(
        history.labels(),
        vec!["coarse probe", "fine probe", "abort shutdown"]
    );
}

#[test]
fn test_timeout_triggers_abort_shutdown() {
    let mut config = fast_config();
    config.timeouts.batch_ms = 100;
    config.timeouts.abort_ms = 100;
    let job = JobOrchestrator::new(config).unwrap();
    let (link, history) = simulated(SimulatorConfig {
        stall_after_batches: Some(5),
        ..Default::default()
    });

    let err = job.run(link).unwrap_err();
    assert_eq!(err.phase(), JobPhase::Cut);
    assert!(err.is_timeout());
    assert!(err.to_string().contains("100ms"));

    let labels = history.labels();
    assert_eq!(labels[5], "safe start");
    assert_eq!(labels.last().map(String::as_str), Some("abort shutdown"));
    assert!(!labels.iter().any(|l| l == "shutdown"));
    assert_eq!(history.closes(), 1);
}

#[test]
fn test_rejected_command_names_it() {
    let job = JobOrchestrator::new(fast_config()).unwrap();
    let (link, history) = simulated(SimulatorConfig {
        reject_prefix: Some("M3".to_string()),
        ..Default::default()
    });

    let err = job.run(link).unwrap_err();
    assert_eq!(err.phase(), JobPhase::Cut);
    assert!(matches!(
        &err.source,
        Error::Sequencer(SequencerError::LinkFault { reason }) if reason.contains("M3 S9000")
    ));
    assert_eq!(history.labels().last().map(String::as_str), Some("abort shutdown"));
}

#[test]
fn test_open_failure_skips_everything() {
    let job = JobOrchestrator::new(fast_config()).unwrap();
    let (link, history) = simulated(SimulatorConfig {
        fail_open: true,
        ..Default::default()
    });

    let err = job.run(link).unwrap_err();
    assert_eq!(err.phase(), JobPhase::Connect);
    assert!(err.source.is_connection_error());
    assert!(history.batches().is_empty());
    assert_eq!(history.homing_requests(), 0);
}
