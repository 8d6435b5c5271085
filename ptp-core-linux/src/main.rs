use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use clap::Parser;
use ptp_core::{
    config::{InstanceConfig, PortConfig as CorePortConfig},
    datastructures::{
        common::ClockIdentity,
        datasets::DelayMechanism,
    },
    observability::Snapshot,
    PtpInstance,
};
use rand::RngCore;
use timestamped_socket::{interface::InterfaceName, socket::InterfaceTimestampMode};

mod clock;
mod config;
mod observer;
mod orchestrator;
mod transport;

use clock::LinuxClock;
use config::Config;
use orchestrator::Orchestrator;
use transport::LinuxTransport;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Configuration file to use
    #[clap(long, short = 'c', default_value = "/etc/ptp-core/ptp-core.toml")]
    config: PathBuf,

    /// Set desired logging level, overriding the config file
    #[clap(long, short = 'l')]
    loglevel: Option<tracing::Level>,
}

fn setup_logger(level: tracing::Level) {
    tracing_log::LogTracer::init().expect("could not install the log-to-tracing bridge");
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(true)
        .init();
}

fn resolve_clock_identity(configured: Option<ClockIdentity>) -> ClockIdentity {
    configured.unwrap_or_else(|| ClockIdentity::synthesize(rand::thread_rng().next_u64()))
}

fn build_instance(config: &Config, port: &config::PortConfig) -> PtpInstance {
    let instance_config = InstanceConfig {
        clock_identity: resolve_clock_identity(config.identity),
        clock_quality: config::default_clock_quality(),
        priority_1: config.priority1,
        priority_2: config.priority2,
        domain_number: config.domain,
        slave_only: config.slave_only,
    };

    let port_config = CorePortConfig {
        log_announce_interval: port.log_announce_interval,
        log_sync_interval: port.log_sync_interval,
        log_min_delay_req_interval: port.log_min_delay_req_interval,
        log_min_pdelay_req_interval: port.log_min_pdelay_req_interval,
        announce_receipt_timeout: port.announce_receipt_timeout,
        delay_mechanism: DelayMechanism::from(port.delay_mechanism),
        two_step: port.two_step.unwrap_or(true),
        ..CorePortConfig::default()
    };

    PtpInstance::new(instance_config, port_config, 3.0)
}

// Exit code 3 ("daemonization failure") is reserved but never returned:
// this daemon stays in the foreground and relies on a supervisor
// (systemd, runit, ...) for backgrounding and restart policy rather than
// double-forking itself, so there is no daemonization step that can fail.

#[tokio::main]
async fn main() {
    let args = Args::parse();
    setup_logger(args.loglevel.unwrap_or(tracing::Level::INFO));

    // Exit code 1 covers every configuration-level problem (`spec.md` §6):
    // an unreadable/malformed file, an empty port list, or a port whose
    // interface name the kernel will never accept.
    let config = match Config::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("could not read configuration: {e}");
            std::process::exit(1);
        }
    };

    let Some(port_config) = config.ports.first().cloned() else {
        tracing::error!("no ports configured");
        std::process::exit(1);
    };

    let interface = match port_config.interface.parse::<InterfaceName>() {
        Ok(interface) => interface,
        Err(_) => {
            tracing::error!("invalid interface name: {}", port_config.interface);
            std::process::exit(1);
        }
    };

    let instance = build_instance(&config, &port_config);

    // Exit code 2 covers failure to acquire the collaborator resources the
    // configuration asked for: the multicast socket pair or the PHC device.
    // The source's `ptpd` used this code for allocation failures; this
    // daemon never performs fallible heap allocation of its own, so it
    // reuses the code for the nearest equivalent, a resource the OS
    // refused to hand over.
    let transport = match LinuxTransport::open(interface, InterfaceTimestampMode::SoftwareAll, None) {
        Ok(transport) => transport,
        Err(e) => {
            tracing::error!("could not open network port on {interface}: {e}");
            std::process::exit(2);
        }
    };

    let clock = match &port_config.hardware_clock {
        Some(path) => match LinuxClock::open_phc(std::path::Path::new(path)) {
            Ok(clock) => clock,
            Err(e) => {
                tracing::error!("could not open hardware clock {path}: {e}");
                std::process::exit(2);
            }
        },
        None => LinuxClock::realtime(),
    };

    let snapshot = Arc::new(Mutex::new(Snapshot::capture(&instance)));
    let observer_handle = observer::spawn(config.observability.clone(), snapshot.clone());

    let shutdown = Arc::new(AtomicBool::new(false));
    let orchestrator_shutdown = shutdown.clone();
    let orchestrator = Orchestrator::new(instance, transport, clock, snapshot);
    let orchestrator_handle = tokio::task::spawn_blocking(move || orchestrator.run(orchestrator_shutdown));

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("could not install SIGTERM handler");
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
        .expect("could not install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("received SIGTERM"),
        _ = sigint.recv() => tracing::info!("received SIGINT"),
    }

    shutdown.store(true, Ordering::Relaxed);
    let _ = orchestrator_handle.await;
    observer_handle.abort();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_clock_identity_keeps_configured_value() {
        let configured = ClockIdentity([1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(resolve_clock_identity(Some(configured)), configured);
    }
}
