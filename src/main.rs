use anyhow::Context;
use starmill::{
    build_link, init_logging, list_ports, JobConfig, JobOrchestrator, JobPhase, VERSION,
};

/// Usage: `starmill [CONFIG]`. Without a config file the built-in job runs
/// against the default serial port.
fn main() -> anyhow::Result<()> {
    init_logging()?;

    let config = match std::env::args_os().nth(1) {
        Some(path) => JobConfig::load(&path)
            .with_context(|| format!("failed to load {}", path.to_string_lossy()))?,
        None => {
            let config = JobConfig::default();
            config.validate().context("invalid built-in job configuration")?;
            config
        }
    };

    tracing::info!(
        version = VERSION,
        link = %config.connection.link,
        port = config.connection.port.as_str(),
        "Starting star cutting job"
    );

    let job = JobOrchestrator::new(config)?;
    match job.run(build_link(job.config())) {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(e) => {
            if e.phase == JobPhase::Connect && e.source.is_connection_error() {
                match list_ports() {
                    Ok(ports) if ports.is_empty() => tracing::warn!("No CNC serial ports found"),
                    Ok(ports) => {
                        for port in ports {
                            tracing::info!(
                                port = port.port_name.as_str(),
                                description = port.description.as_str(),
                                "Available port"
                            );
                        }
                    }
                    Err(list_error) => {
                        tracing::warn!(error = %list_error, "Could not list serial ports")
                    }
                }
            }
            Err(e.into())
        }
    }
}
