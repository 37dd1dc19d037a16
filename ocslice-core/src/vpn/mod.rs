//! VPN session module
//!
//! Launches and supervises the OpenConnect tunnel, probes whether a tunnel is
//! up, and tears it down with elevated commands.

pub mod connection_event;
pub mod elevation;
pub mod helpers;
pub mod manager;
pub mod output_parser;
pub mod pid_file;
pub mod probe;
pub mod state;
pub mod supervisor;
pub mod teardown;
pub mod tunnel_log;

// Public re-exports
pub use connection_event::{ConnectOutcome, ScanEvent};
pub use elevation::{ElevatedCommand, Elevator, SudoElevator};
pub use helpers::HelperPaths;
pub use manager::{Reply, SessionManager, StatusReply};
pub use output_parser::OutputParser;
pub use pid_file::TrackingArtifact;
pub use probe::{SessionProbe, SystemProbe};
pub use state::ConnectionState;
pub use supervisor::{ConnectHandle, Supervisor};
pub use teardown::Teardown;
pub use tunnel_log::TunnelLog;
