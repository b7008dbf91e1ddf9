use log::LevelFilter;

struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, _: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        eprintln!("[{}] {}", record.level(), record.args());
    }

    fn flush(&self) {}
}

/// Installs the process-wide logger. Debug mode also shows the
/// scheduler's phase transitions; otherwise only warnings and worker
/// faults reach stderr.
pub fn init(debug: bool) {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };

    // set_logger only fails on a second call; the first logger wins.
    let _ = log::set_logger(&LOGGER).map(|_| log::set_max_level(level));
}
