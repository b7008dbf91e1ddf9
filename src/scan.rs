use std::net::{IpAddr, SocketAddr};

use crate::{error::ScanError, validate};

use self::{
    partition::Distribution,
    probe::Probe,
    sched::Schedule,
    sink::{Event, ReportSink},
};

pub mod partition;
pub mod probe;
pub mod sched;
pub mod sink;

/// Final classification of a single port probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortState {
    Open,
    Closed,
    /// The probe itself failed (resolution, socket creation, permissions).
    /// Distinct from a closed port and carries the underlying message.
    Failed(String),
}

/// One probe, one outcome. Handed to the sink as soon as it is known and
/// not retained anywhere else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub port: u16,
    pub state: PortState,
}

/// Validated description of one whole scan. Built once, never mutated.
#[derive(Debug, Clone, Copy)]
pub struct ScanRequest {
    pub target: IpAddr,
    pub start_port: u16,
    pub end_port: u16,
    pub workers: usize,
}

impl ScanRequest {
    pub fn new(
        target: IpAddr,
        start_port: u16,
        end_port: u16,
        workers: usize,
    ) -> Result<Self, ScanError> {
        validate::port_range(start_port, end_port)?;
        validate::worker_count(workers)?;

        Ok(Self {
            target,
            start_port,
            end_port,
            workers,
        })
    }

    pub fn port_count(&self) -> usize {
        usize::from(self.end_port - self.start_port) + 1
    }
}

pub struct Scanner<'a> {
    request: ScanRequest,
    distribution: Distribution,
    schedule: Schedule,
    context: ScanContext<'a>,
}

/// Everything a worker needs to drain its slice. Shared by reference
/// across all workers of one scan.
pub(crate) struct ScanContext<'a> {
    target: IpAddr,
    probe: &'a dyn Probe,
    sink: &'a dyn ReportSink,
}

impl<'a> Scanner<'a> {
    pub fn new(
        request: ScanRequest,
        probe: &'a dyn Probe,
        sink: &'a dyn ReportSink,
        distribution: Distribution,
        schedule: Schedule,
    ) -> Self {
        Self {
            request,
            distribution,
            schedule,
            context: ScanContext {
                target: request.target,
                probe,
                sink,
            },
        }
    }

    /// Runs the whole scan and blocks until every worker has drained its
    /// slice. A failed probe is terminal for that port only; it never
    /// aborts sibling probes or sibling workers.
    pub fn run(&self) -> Result<(), ScanError> {
        log::debug!(
            "Partitioning {} ports ({}-{}) across {} workers ({:?})",
            self.request.port_count(),
            self.request.start_port,
            self.request.end_port,
            self.request.workers,
            self.distribution,
        );

        let slices = self.distribution.split(
            self.request.start_port,
            self.request.end_port,
            self.request.workers,
        );

        log::debug!("Launching workers ({:?})", self.schedule);
        self.schedule.execute(&self.context, &slices)?;
        log::debug!("All workers joined");

        Ok(())
    }
}

impl ScanContext<'_> {
    /// Probes every port of one slice strictly in order, reporting
    /// progress whenever the worker crosses a decile of its slice.
    pub(crate) fn run_slice(&self, worker: usize, ports: &[u16]) {
        let total = ports.len();
        let mut reported = 0;

        for (done, &port) in ports.iter().enumerate().map(|(i, p)| (i + 1, p)) {
            self.probe_port(port);

            let decile = done * 10 / total;
            if decile > reported {
                self.sink.report(Event::Progress {
                    worker,
                    done,
                    total,
                });
                reported = decile;
            }
        }
    }

    fn probe_port(&self, port: u16) {
        self.sink.report(Event::Checking(port));

        let state = self.probe.connect(SocketAddr::new(self.target, port));
        self.sink.report(Event::Outcome(ProbeOutcome { port, state }));
    }
}
