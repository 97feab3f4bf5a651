use std::env;
use std::io::Write;

use colored::Colorize;
use env_logger::Builder;
use log::{Level, LevelFilter};

/// Map `-v` count and `--debug` to a level filter.
pub fn level_for(verbosity: u8, debug: bool) -> LevelFilter {
    let verbosity = if debug { verbosity.max(2) } else { verbosity };
    match verbosity {
        0 => LevelFilter::Warn,  // default: warnings and errors
        1 => LevelFilter::Info,  // -v: info and up
        2 => LevelFilter::Debug, // -vv or --debug: debug and up
        _ => LevelFilter::Trace, // -vvv: trace and up
    }
}

/// Install the logger. `RUST_LOG`, when set, overrides the flags.
pub fn init_logger(verbosity: u8, debug: bool) {
    let mut builder = Builder::new();
    builder.filter_level(level_for(verbosity, debug));

    if let Ok(filters) = env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }

    builder.format(|buf, record| {
        let level = record.level();

        let level_label = match level {
            Level::Error => "ERROR".red().bold(),
            Level::Warn => "WARN ".yellow().bold(),
            Level::Info => "INFO ".white().bold(),
            Level::Debug => "DEBUG".bright_black(),
            Level::Trace => "TRACE".bright_black(),
        };

        writeln!(buf, "{} {}", level_label, record.args())
    });

    builder.init();
}
