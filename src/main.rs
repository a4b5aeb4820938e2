use std::fs::File;

use cpuscope_cpuid::cpu;
use cpuscope_logging::{log_error, log_info, set_logger, LogCategory, LogLevel, Logger};

pub const LOG_CAT : LogCategory = LogCategory::new("Main");

static LOGGER: Logger = Logger::new();

fn main() {
    set_logger(&LOGGER);

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-v" | "--verbose" => LOGGER.set_max_level(LogLevel::Verbose),
            "--debug" => LOGGER.set_max_level(LogLevel::Debug),
            "--log" => match args.next().map(File::create) {
                Some(Ok(file)) => {
                    _ = LOGGER.add_writer(Box::new(file));
                },
                Some(Err(err)) => log_error!(LOG_CAT, "Failed to create log file: {err}"),
                None => log_error!(LOG_CAT, "--log expects a file path"),
            },
            _ => log_error!(LOG_CAT, "Unknown argument '{arg}'"),
        }
    }

    let info = cpu();
    log_info!(LOG_CAT, "{} features detected", info.features().len());
    println!("{info}");

    LOGGER.flush();
}
