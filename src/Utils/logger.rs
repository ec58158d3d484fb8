//! Terminal logging, optionally duplicated into a file.
use crate::errors::EvolutionError;
use simplelog::{
    ColorChoice, CombinedLogger, Config, LevelFilter, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::File;

/// Installs the global logger. Fails with `EvolutionError::Logger` when a logger is already set.
pub fn init_logger(level: LevelFilter, log_file: Option<&str>) -> Result<(), EvolutionError> {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    if let Some(path) = log_file {
        loggers.push(WriteLogger::new(level, Config::default(), File::create(path)?));
    }
    CombinedLogger::init(loggers)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_second_logger_is_rejected() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();
        // the first call may lose against a logger set by another test
        let _ = init_logger(LevelFilter::Debug, Some(&path));
        assert!(matches!(
            init_logger(LevelFilter::Info, None),
            Err(EvolutionError::Logger(_))
        ));
        assert!(init_logger(LevelFilter::Info, Some("no/such/dir/log.txt")).is_err());
    }
}
