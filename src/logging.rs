//! Logging setup via `log4rs`: a console appender for interactive use and,
//! when a log file is configured, an additional file appender using the
//! JSON encoder (friendlier to grep/jq than the pattern-encoded console
//! line when the server is run unattended).

use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::json::JsonEncoder;
use log4rs::encode::pattern::PatternEncoder;

use crate::error::{Error, Result};

pub fn init(log_file: Option<&std::path::Path>, level: LevelFilter) -> Result<()> {
    let console = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d(%Y-%m-%d %H:%M:%S)} {l} {t} - {m}{n}")))
        .build();

    let mut builder = Config::builder().appender(Appender::builder().build("console", Box::new(console)));
    let mut root = Root::builder().appender("console");

    if let Some(path) = log_file {
        let file = FileAppender::builder()
            .encoder(Box::new(JsonEncoder::new()))
            .build(path)
            .map_err(|e| Error::io(path, std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
        builder = builder.appender(Appender::builder().build("file", Box::new(file)));
        root = root.appender("file");
    }

    let config = builder
        .build(root.build(level))
        .map_err(|e| Error::Format(format!("logging config error: {e}")))?;

    log4rs::init_config(config).map_err(|e| Error::Format(format!("logging init error: {e}")))?;
    Ok(())
}
