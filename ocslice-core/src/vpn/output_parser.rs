//! Marker-based classification of tunnel process output
//!
//! OpenConnect reports progress as free text. A line on stdout containing a
//! success marker means the tunnel is operational; a line on stderr
//! containing a failure marker means authentication or certificate
//! handling failed. Markers are case-sensitive substrings.

use crate::vpn::ScanEvent;
use regex::Regex;

/// Substrings on stdout that mean the tunnel is up
pub const SUCCESS_MARKERS: [&str; 4] = [
    "CSTP connected",
    "Configured as",
    "VPN tunnel running",
    "Connected tun",
];

/// Substrings on stderr that mean the attempt failed
pub const FAILURE_MARKERS: [&str; 4] = [
    "Login failed",
    "Failed to decrypt",
    "Authentication failed",
    "Certificate verification failed",
];

/// Which stream a line was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl std::fmt::Display for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputStream::Stdout => write!(f, "stdout"),
            OutputStream::Stderr => write!(f, "stderr"),
        }
    }
}

/// Parser for OpenConnect CLI output
#[derive(Debug, Clone)]
pub struct OutputParser {
    success_pattern: Regex,
    failure_pattern: Regex,
}

fn literal_alternation(markers: &[&str]) -> String {
    markers
        .iter()
        .map(|m| regex::escape(m))
        .collect::<Vec<_>>()
        .join("|")
}

impl OutputParser {
    /// Create a new OutputParser with compiled marker patterns
    pub fn new() -> Self {
        Self {
            success_pattern: Regex::new(&literal_alternation(&SUCCESS_MARKERS))
                .expect("Failed to compile success pattern"),
            failure_pattern: Regex::new(&literal_alternation(&FAILURE_MARKERS))
                .expect("Failed to compile failure pattern"),
        }
    }

    /// Classify a stdout line
    pub fn parse_line(&self, line: &str) -> ScanEvent {
        if self.success_pattern.is_match(line) {
            return ScanEvent::Connected;
        }
        ScanEvent::Unrecognized
    }

    /// Classify a stderr line
    pub fn parse_error(&self, line: &str) -> ScanEvent {
        if self.failure_pattern.is_match(line) {
            return ScanEvent::Failed {
                line: line.to_string(),
            };
        }
        ScanEvent::Unrecognized
    }

    /// Classify a line from the given stream
    ///
    /// Success markers only count on stdout and failure markers only on
    /// stderr.
    pub fn classify(&self, stream: OutputStream, line: &str) -> ScanEvent {
        match stream {
            OutputStream::Stdout => self.parse_line(line),
            OutputStream::Stderr => self.parse_error(line),
        }
    }
}

impl Default for OutputParser {
    fn default() -> Self {
        Self::new()
    }
}
