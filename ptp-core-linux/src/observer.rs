//! A tiny `serde_json`-over-UNIX-socket endpoint exposing the instance's
//! current state, grounded in `statime-linux`'s `observer.rs`/`socket.rs`.

use std::{
    os::unix::fs::PermissionsExt,
    path::Path,
    sync::{Arc, Mutex},
};

use ptp_core::{
    datastructures::{
        common::{ClockIdentity, ClockQuality, PortIdentity},
        datasets::DelayMechanism,
    },
    observability::Snapshot,
    port::PortState,
};
use serde::Serialize;
use tokio::{io::AsyncWriteExt, net::UnixListener, task::JoinHandle};

use crate::config::ObservabilityConfig;

/// Shared slot the orchestrator writes a fresh [`Snapshot`] into after every
/// dispatch/tick; the observer task only ever reads it.
pub type SharedSnapshot = Arc<Mutex<Snapshot>>;

#[derive(Serialize)]
struct ObservableState {
    clock_identity: String,
    clock_class: u8,
    clock_accuracy: u8,
    priority_1: u8,
    priority_2: u8,
    domain_number: u8,
    slave_only: bool,

    port_identity: String,
    port_state: String,
    delay_mechanism: String,

    parent_port_identity: String,
    grandmaster_identity: String,

    steps_removed: u16,
    offset_from_master_nanos: i64,
    mean_path_delay_nanos: i64,
    observed_drift_ppb: i32,
}

impl From<Snapshot> for ObservableState {
    fn from(snapshot: Snapshot) -> Self {
        fn identity(id: ClockIdentity) -> String {
            id.to_string()
        }
        fn port(id: PortIdentity) -> String {
            id.to_string()
        }
        fn state(state: PortState) -> String {
            state.to_string()
        }
        fn delay_mechanism(mechanism: DelayMechanism) -> String {
            match mechanism {
                DelayMechanism::E2E => "E2E".to_string(),
                DelayMechanism::P2P => "P2P".to_string(),
                DelayMechanism::Disabled => "Disabled".to_string(),
            }
        }
        fn quality(quality: ClockQuality) -> (u8, u8) {
            (quality.clock_class, quality.clock_accuracy)
        }

        let (clock_class, clock_accuracy) = quality(snapshot.clock_quality);

        Self {
            clock_identity: identity(snapshot.clock_identity),
            clock_class,
            clock_accuracy,
            priority_1: snapshot.priority_1,
            priority_2: snapshot.priority_2,
            domain_number: snapshot.domain_number,
            slave_only: snapshot.slave_only,
            port_identity: port(snapshot.port_identity),
            port_state: state(snapshot.port_state),
            delay_mechanism: delay_mechanism(snapshot.delay_mechanism),
            parent_port_identity: port(snapshot.parent_port_identity),
            grandmaster_identity: identity(snapshot.grandmaster_identity),
            steps_removed: snapshot.steps_removed,
            offset_from_master_nanos: snapshot.offset_from_master.total_nanos(),
            mean_path_delay_nanos: snapshot.mean_path_delay.total_nanos(),
            observed_drift_ppb: snapshot.observed_drift_ppb,
        }
    }
}

/// Spawn the observer task; a no-op if no `observation-path` is configured.
pub fn spawn(config: ObservabilityConfig, snapshot: SharedSnapshot) -> JoinHandle<std::io::Result<()>> {
    tokio::spawn(async move {
        let result = observer(config, snapshot).await;
        if let Err(ref e) = result {
            log::warn!("abnormal termination of the state observer: {e}");
            log::warn!("the state observer will not be available");
        }
        result
    })
}

async fn observer(config: ObservabilityConfig, snapshot: SharedSnapshot) -> std::io::Result<()> {
    let path = match config.observation_path {
        Some(path) => path,
        None => return Ok(()),
    };

    let permissions = std::fs::Permissions::from_mode(config.observation_permissions);
    let listener = create_unix_socket_with_permissions(&path, permissions)?;

    loop {
        let (mut stream, _addr) = listener.accept().await?;
        let observable: ObservableState = (*snapshot.lock().unwrap()).into();
        write_json(&mut stream, &observable).await?;
    }
}

fn other_error<T>(msg: String) -> std::io::Result<T> {
    Err(std::io::Error::new(std::io::ErrorKind::Other, msg))
}

fn create_unix_socket_with_permissions(path: &Path, permissions: std::fs::Permissions) -> std::io::Result<UnixListener> {
    let listener = create_unix_socket(path)?;
    std::fs::set_permissions(path, permissions)?;
    Ok(listener)
}

fn create_unix_socket(path: &Path) -> std::io::Result<UnixListener> {
    if path.exists() {
        use std::os::unix::fs::FileTypeExt;
        let meta = std::fs::metadata(path)?;
        if !meta.file_type().is_socket() {
            return other_error(format!("path {path:?} exists but is not a socket"));
        }
        std::fs::remove_file(path)?;
    }

    match UnixListener::bind(path) {
        Ok(listener) => Ok(listener),
        Err(e) => {
            if let Some(parent) = path.parent() {
                if !parent.exists() {
                    return other_error(format!(
                        "could not create observe socket at {path:?}: parent directory does not exist"
                    ));
                }
            }
            other_error(format!("could not create observe socket at {path:?}: {e}"))
        }
    }
}

async fn write_json<T>(stream: &mut tokio::net::UnixStream, value: &T) -> std::io::Result<()>
where
    T: Serialize,
{
    let bytes = serde_json::to_vec(value)?;
    stream.write_all(&bytes).await
}
