use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Writes log records to stderr, coloured by level.
struct Logger;

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let color = match record.level() {
            Level::Error => 31,
            Level::Warn => 93,
            Level::Info => 0,
            Level::Debug => 32,
            Level::Trace => 90,
        };
        eprintln!(
            "\u{1B}[{}m[{:>5}] {}\u{1B}[0m",
            color,
            record.level(),
            record.args()
        );
    }

    fn flush(&self) {}
}

pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    static LOGGER: Logger = Logger;
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}
