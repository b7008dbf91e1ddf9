use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Mutex,
};

use psweep::scan::{
    partition::Distribution,
    probe::Probe,
    sched::Schedule,
    sink::{Event, LineSink, ReportSink},
    PortState, ProbeOutcome, ScanRequest, Scanner,
};

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Probe double that never touches the network.
struct ScriptedProbe {
    open: Vec<u16>,
    fail_all: bool,
    calls: Mutex<Vec<u16>>,
}

impl ScriptedProbe {
    fn with_open(open: Vec<u16>) -> Self {
        Self {
            open,
            fail_all: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            open: Vec::new(),
            fail_all: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<u16> {
        self.calls.lock().unwrap().clone()
    }
}

impl Probe for ScriptedProbe {
    fn connect(&self, addr: SocketAddr) -> PortState {
        self.calls.lock().unwrap().push(addr.port());

        if self.fail_all {
            PortState::Failed(String::from("simulated fault"))
        } else if self.open.contains(&addr.port()) {
            PortState::Open
        } else {
            PortState::Closed
        }
    }
}

#[derive(Default)]
struct CollectSink {
    events: Mutex<Vec<Event>>,
}

impl CollectSink {
    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

impl ReportSink for CollectSink {
    fn report(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

fn all_modes() -> [(Distribution, Schedule); 4] {
    [
        (Distribution::Striped, Schedule::Threads),
        (Distribution::Striped, Schedule::Pool),
        (Distribution::Chunked, Schedule::Threads),
        (Distribution::Chunked, Schedule::Pool),
    ]
}

fn open_ports(events: &[Event]) -> Vec<u16> {
    let mut ports = events
        .iter()
        .filter_map(|event| match event {
            Event::Outcome(ProbeOutcome {
                port,
                state: PortState::Open,
            }) => Some(*port),
            _ => None,
        })
        .collect::<Vec<_>>();
    ports.sort_unstable();
    ports
}

#[test]
fn every_port_is_probed_exactly_once() {
    for (distribution, schedule) in all_modes() {
        let probe = ScriptedProbe::with_open(vec![80, 443]);
        let sink = CollectSink::default();
        let request = ScanRequest::new(LOCALHOST, 79, 444, 4).unwrap();

        Scanner::new(request, &probe, &sink, distribution, schedule)
            .run()
            .unwrap();

        let mut calls = probe.calls();
        calls.sort_unstable();
        assert_eq!(
            calls,
            (79..=444).collect::<Vec<u16>>(),
            "{distribution:?}/{schedule:?}"
        );
        assert_eq!(open_ports(&sink.events()), vec![80, 443]);
    }
}

#[test]
fn probe_faults_stay_contained_to_their_port() {
    for (distribution, schedule) in all_modes() {
        let probe = ScriptedProbe::failing();
        let sink = CollectSink::default();
        let request = ScanRequest::new(LOCALHOST, 1, 100, 4).unwrap();

        Scanner::new(request, &probe, &sink, distribution, schedule)
            .run()
            .unwrap();

        let events = sink.events();
        let failed = events
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    Event::Outcome(ProbeOutcome {
                        state: PortState::Failed(_),
                        ..
                    })
                )
            })
            .count();
        let outcomes = events
            .iter()
            .filter(|e| matches!(e, Event::Outcome(_)))
            .count();

        assert_eq!(failed, 100, "{distribution:?}/{schedule:?}");
        assert_eq!(outcomes, 100);
        assert!(open_ports(&events).is_empty());
    }
}

#[test]
fn run_returns_only_after_every_outcome_is_reported() {
    for (distribution, schedule) in all_modes() {
        let probe = ScriptedProbe::with_open(Vec::new());
        let sink = CollectSink::default();
        let request = ScanRequest::new(LOCALHOST, 1, 64, 7).unwrap();

        Scanner::new(request, &probe, &sink, distribution, schedule)
            .run()
            .unwrap();

        let events = sink.events();
        let checking = events
            .iter()
            .filter(|e| matches!(e, Event::Checking(_)))
            .count();
        let outcomes = events
            .iter()
            .filter(|e| matches!(e, Event::Outcome(_)))
            .count();

        assert_eq!(checking, 64, "{distribution:?}/{schedule:?}");
        assert_eq!(outcomes, 64);
    }
}

#[test]
fn oversized_worker_count_still_probes_each_port_once() {
    for (distribution, schedule) in all_modes() {
        let probe = ScriptedProbe::with_open(Vec::new());
        let sink = CollectSink::default();
        let request = ScanRequest::new(LOCALHOST, 1, 5, 50).unwrap();

        Scanner::new(request, &probe, &sink, distribution, schedule)
            .run()
            .unwrap();

        let mut calls = probe.calls();
        calls.sort_unstable();
        assert_eq!(calls, vec![1, 2, 3, 4, 5], "{distribution:?}/{schedule:?}");
    }
}

#[test]
fn single_worker_reports_in_slice_order() {
    let probe = ScriptedProbe::with_open(vec![3]);
    let sink = CollectSink::default();
    let request = ScanRequest::new(LOCALHOST, 1, 10, 1).unwrap();

    Scanner::new(
        request,
        &probe,
        &sink,
        Distribution::Striped,
        Schedule::Threads,
    )
    .run()
    .unwrap();

    let probes = sink
        .events()
        .into_iter()
        .filter_map(|event| match event {
            Event::Checking(port) => Some(("checking", port)),
            Event::Outcome(outcome) => Some(("outcome", outcome.port)),
            Event::Progress { .. } => None,
        })
        .collect::<Vec<_>>();

    let expected = (1..=10)
        .flat_map(|port| [("checking", port), ("outcome", port)])
        .collect::<Vec<_>>();
    assert_eq!(probes, expected);
}

#[test]
fn progress_tracks_one_workers_slice() {
    let probe = ScriptedProbe::with_open(Vec::new());
    let sink = CollectSink::default();
    let request = ScanRequest::new(LOCALHOST, 1, 20, 1).unwrap();

    Scanner::new(
        request,
        &probe,
        &sink,
        Distribution::Striped,
        Schedule::Pool,
    )
    .run()
    .unwrap();

    let progress = sink
        .events()
        .into_iter()
        .filter_map(|event| match event {
            Event::Progress {
                worker,
                done,
                total,
            } => Some((worker, done, total)),
            _ => None,
        })
        .collect::<Vec<_>>();

    assert!(!progress.is_empty());
    assert!(progress
        .iter()
        .all(|&(worker, done, total)| worker == 0 && done <= total && total == 20));
    assert_eq!(progress.last(), Some(&(0, 20, 20)));
    assert!(progress.windows(2).all(|w| w[0].1 < w[1].1));
}

#[test]
fn line_sink_logs_outcomes_and_tallies_open_ports() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("scan.log");

    let sink = LineSink::new(LOCALHOST, &log_path).unwrap();
    sink.report(Event::Outcome(ProbeOutcome {
        port: 80,
        state: PortState::Open,
    }));
    sink.report(Event::Outcome(ProbeOutcome {
        port: 81,
        state: PortState::Closed,
    }));
    sink.report(Event::Outcome(ProbeOutcome {
        port: 82,
        state: PortState::Failed(String::from("no route to host")),
    }));

    let summary = sink.summary();
    assert_eq!(summary.open_ports, vec![80]);
    assert_eq!(summary.closed, 1);
    assert_eq!(summary.failed, 1);

    let log = std::fs::read_to_string(&log_path).unwrap();
    assert!(log.contains("INFO - Port 80 is open on 127.0.0.1"));
    assert!(log.contains("INFO - Port 81 is closed on 127.0.0.1"));
    assert!(log.contains("ERROR - Error scanning port 82 on 127.0.0.1: no route to host"));
}
