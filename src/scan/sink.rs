use std::{
    fmt,
    fs::{File, OpenOptions},
    io::Write,
    net::IpAddr,
    path::Path,
    sync::{Mutex, PoisonError},
};

use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::error::ScanError;

use super::{PortState, ProbeOutcome};

/// Everything workers tell the outside world about a running scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A probe is about to start on this port.
    Checking(u16),
    /// The probe finished and classified its port.
    Outcome(ProbeOutcome),
    /// One worker's progress through its own slice.
    Progress {
        worker: usize,
        done: usize,
        total: usize,
    },
}

/// Serialization point shared by every worker of one scan. No two events
/// may interleave; per-worker ordering is preserved because each worker
/// reports sequentially.
pub trait ReportSink: Sync {
    fn report(&self, event: Event);
}

/// Tally the sink accumulates while the scan runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub open_ports: Vec<u16>,
    pub closed: usize,
    pub failed: usize,
}

/// Console and log-file consumer. Open ports and progress go to stdout;
/// every outcome also lands as a timestamped line in the append-only log.
/// Closed ports and probe errors stay off the console so a large scan is
/// not flooded by negatives.
pub struct LineSink {
    target: IpAddr,
    inner: Mutex<SinkInner>,
}

struct SinkInner {
    log: File,
    summary: ScanSummary,
}

impl LineSink {
    pub fn new(target: IpAddr, log_path: &Path) -> Result<Self, ScanError> {
        let log = OpenOptions::new()
            .append(true)
            .create(true)
            .open(log_path)
            .map_err(|e| ScanError::LogFileFailed(log_path.display().to_string(), e))?;

        Ok(Self {
            target,
            inner: Mutex::new(SinkInner {
                log,
                summary: ScanSummary::default(),
            }),
        })
    }

    /// Tally of everything reported so far. Open ports come back sorted.
    pub fn summary(&self) -> ScanSummary {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut summary = inner.summary.clone();
        summary.open_ports.sort_unstable();
        summary
    }
}

impl ReportSink for LineSink {
    fn report(&self, event: Event) {
        // One lock per event keeps lines whole across workers.
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        match event {
            Event::Checking(port) => println!("Checking port {} on {}", port, self.target),
            Event::Outcome(ProbeOutcome { port, state }) => match state {
                PortState::Open => {
                    println!("Port {} is open on {}", port, self.target);
                    inner.log_line(
                        "INFO",
                        format_args!("Port {} is open on {}", port, self.target),
                    );
                    inner.summary.open_ports.push(port);
                }
                PortState::Closed => {
                    inner.log_line(
                        "INFO",
                        format_args!("Port {} is closed on {}", port, self.target),
                    );
                    inner.summary.closed += 1;
                }
                PortState::Failed(reason) => {
                    inner.log_line(
                        "ERROR",
                        format_args!(
                            "Error scanning port {} on {}: {}",
                            port, self.target, reason
                        ),
                    );
                    inner.summary.failed += 1;
                }
            },
            Event::Progress {
                worker,
                done,
                total,
            } => {
                println!(
                    "Worker {}: {}% of slice checked ({}/{})",
                    worker,
                    done * 100 / total,
                    done,
                    total
                );
            }
        }
    }
}

impl SinkInner {
    fn log_line(&mut self, level: &str, message: fmt::Arguments<'_>) {
        let stamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"));

        // Write failures never abort the scan.
        let _ = writeln!(self.log, "{} - {} - {}", stamp, level, message);
    }
}
