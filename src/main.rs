use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::Result;
use clap::{arg, crate_name, crate_version, ArgAction, ArgGroup, ArgMatches, Command};
use pad::PadStr;
use psweep::{
    error::ScanError,
    logger,
    scan::{
        partition::Distribution,
        probe::ConnectProbe,
        sched::Schedule,
        sink::{LineSink, ScanSummary},
        ScanRequest, Scanner,
    },
    validate,
};

struct ParsedArgs {
    debug: bool,
    request: ScanRequest,
    timeout: Duration,
    log_file: PathBuf,
    distribution: Distribution,
    schedule: Schedule,
}

fn parse_args(matches: ArgMatches) -> Result<ParsedArgs, ScanError> {
    let debug = matches.get_flag("debug");

    let target = validate::target(matches.get_one::<String>("target").unwrap())?;

    let start_port = validate::port(matches.get_one::<String>("start-port").unwrap())?;
    let end_port = validate::port(matches.get_one::<String>("end-port").unwrap())?;

    let raw_workers = matches.get_one::<String>("threads").unwrap();
    let workers = raw_workers
        .parse::<usize>()
        .map_err(|_| ScanError::InvalidWorkerCount(raw_workers.to_owned()))?;

    let request = ScanRequest::new(target, start_port, end_port, workers)?;

    let raw_timeout = matches.get_one::<String>("timeout-ms").unwrap();
    let timeout = raw_timeout
        .parse::<u64>()
        .ok()
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
        .ok_or_else(|| ScanError::InvalidTimeout(raw_timeout.to_owned()))?;

    let log_file = PathBuf::from(matches.get_one::<String>("log-file").unwrap());

    let distribution = if matches.get_flag("chunked") {
        Distribution::Chunked
    } else {
        Distribution::Striped
    };

    let schedule = if matches.get_flag("pool") {
        Schedule::Pool
    } else {
        Schedule::Threads
    };

    Ok(ParsedArgs {
        debug,
        request,
        timeout,
        log_file,
        distribution,
        schedule,
    })
}

fn print_summary(summary: &ScanSummary, elapsed: Duration) {
    let mut out = format!("Scan Duration: {:.4}s\n\n", elapsed.as_secs_f32());

    if summary.open_ports.is_empty() {
        out.push_str("Didn't find any open port.\n");
    } else {
        out.push_str("Port    State\n");

        summary.open_ports.iter().for_each(|port| {
            out.push_str(&format!("{}open\n", port.to_string().pad_to_width(8)));
        });
    }

    out.push_str(&format!(
        "\nChecked {} ports: {} open, {} closed, {} errors\n",
        summary.open_ports.len() + summary.closed + summary.failed,
        summary.open_ports.len(),
        summary.closed,
        summary.failed,
    ));

    print!("{}", out);
}

fn main() -> Result<()> {
    let arg_matches = Command::new(crate_name!())
        .about(
            "Concurrent TCP connect scanner.\n\
            Splits a port range across a bounded set of workers.",
        )
        .version(crate_version!())
        .arg_required_else_help(true)
        .args([
            // Miscellaneous arguments.
            arg!(-d --debug "Turns on debugging information").action(ArgAction::SetTrue),
            arg!([target] "IPv4 or IPv6 address to scan").required(true),
            arg!(--"start-port" <PORT> "First port of the range").default_value("1"),
            arg!(--"end-port" <PORT> "Last port of the range").default_value("1024"),
            arg!(--threads <COUNT> "Number of concurrent workers").default_value("10"),
            arg!(--"timeout-ms" <MS> "Per-port connect timeout in milliseconds")
                .default_value("1000"),
            arg!(--"log-file" <PATH> "Append-only scan log").default_value("port_scanner.log"),
        ])
        .args([
            // Port distribution policies.
            arg!(--striped "Hand each worker every n-th port (default)").action(ArgAction::SetTrue),
            arg!(--chunked "Deal contiguous runs of ports round-robin").action(ArgAction::SetTrue),
        ])
        .group(ArgGroup::new("distribution").args(["striped", "chunked"]))
        .args([
            // Scheduling disciplines.
            arg!(--spawn "One thread per worker slice (default)").action(ArgAction::SetTrue),
            arg!(--pool "Run slices on a fixed-size worker pool").action(ArgAction::SetTrue),
        ])
        .group(ArgGroup::new("scheduler").args(["spawn", "pool"]))
        .get_matches();

    // Extract and validate arguments before anything touches the network.
    let parsed = parse_args(arg_matches)?;

    logger::init(parsed.debug);

    // The sink is shared by every worker for the lifetime of the scan.
    let sink = LineSink::new(parsed.request.target, &parsed.log_file)?;
    let probe = ConnectProbe::new(parsed.timeout);

    let scanner = Scanner::new(
        parsed.request,
        &probe,
        &sink,
        parsed.distribution,
        parsed.schedule,
    );

    let now = Instant::now();
    scanner.run()?;
    let elapsed = now.elapsed();

    print_summary(&sink.summary(), elapsed);

    Ok(())
}
