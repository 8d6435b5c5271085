//! Core algorithms of an IEEE 1588-2008 ordinary/boundary clock.
//!
//! This crate implements the Best Master Clock algorithm, the PTP port state
//! machine, the wire codec for the ten PTP message types, and the clock
//! servo. It deliberately knows nothing about sockets, the OS clock, or
//! configuration file formats: those are external collaborators, described
//! by the traits in [`clock`] and [`network`], and implemented concretely by
//! a consumer such as the `ptp-core-linux` daemon.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod bmc;
pub mod clock;
pub mod config;
pub mod datastructures;
pub mod network;
pub mod observability;
pub mod port;
pub mod servo;
pub mod time;

mod ptp_instance;

pub use ptp_instance::PtpInstance;

use datastructures::common::PortIdentity;

/// An observable change in the state of the instance, handed to the
/// orchestrator so it can log or export it without needing to poll data sets
/// on every iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    PortBecameInitializing { port_id: PortIdentity },
    PortBecameFaulty { port_id: PortIdentity },
    PortBecameDisabled { port_id: PortIdentity },
    PortBecameListening { port_id: PortIdentity },
    PortBecamePreMaster { port_id: PortIdentity },
    PortBecameMaster { port_id: PortIdentity },
    PortBecamePassive { port_id: PortIdentity },
    PortBecameUncalibrated { port_id: PortIdentity },
    PortBecameSlave {
        port_id: PortIdentity,
        master_port_id: PortIdentity,
    },
}

impl core::fmt::Display for Event {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Event::PortBecameInitializing { port_id } => {
                write!(f, "port {port_id} became Initializing")
            }
            Event::PortBecameFaulty { port_id } => write!(f, "port {port_id} became Faulty"),
            Event::PortBecameDisabled { port_id } => write!(f, "port {port_id} became Disabled"),
            Event::PortBecameListening { port_id } => {
                write!(f, "port {port_id} became Listening")
            }
            Event::PortBecamePreMaster { port_id } => {
                write!(f, "port {port_id} became PreMaster")
            }
            Event::PortBecameMaster { port_id } => write!(f, "port {port_id} became Master"),
            Event::PortBecamePassive { port_id } => write!(f, "port {port_id} became Passive"),
            Event::PortBecameUncalibrated { port_id } => {
                write!(f, "port {port_id} became Uncalibrated")
            }
            Event::PortBecameSlave {
                port_id,
                master_port_id,
            } => write!(f, "port {port_id} became Slave to {master_port_id}"),
        }
    }
}
