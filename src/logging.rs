use log::{Level, LevelFilter};
use std::io;

/// Initialize logging with the fern logger.
///
/// The callback receives every message for display in a frontend. Messages
/// also go to stderr and, when it can be created, to `/tmp/drivesync.log`
/// so a failed clone leaves a record behind.
pub fn log<F: Fn(Level, &str) + Send + Sync + 'static>(
    callback: F,
) -> Result<(), fern::InitError> {
    fern::Dispatch::new()
        .level(LevelFilter::Debug)
        // This will be used by the front end for displaying logs in a UI
        .chain(fern::Output::call(move |record| {
            callback(record.level(), &format!("{}", record.args()))
        }))
        // Whereas this will handle displaying the logs to the terminal & a log file
        .chain({
            let mut logger = fern::Dispatch::new()
                .format(|out, message, record| {
                    out.finish(format_args!(
                        "[{} drivesync{}] {}",
                        record.level(),
                        match (record.file(), record.line()) {
                            (Some(file), Some(line)) => format!(":{}:{}", file, line),
                            _ => "".into(),
                        },
                        message
                    ))
                })
                .chain(io::stderr());

            match fern::log_file("/tmp/drivesync.log") {
                Ok(log) => logger = logger.chain(log),
                Err(why) => {
                    eprintln!("failed to create log file at /tmp/drivesync.log: {}", why);
                }
            }

            logger
        })
        .apply()?;

    Ok(())
}
