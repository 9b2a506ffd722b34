use landau::config::LoggingConfig;
use landau::logging::{LogContext, get_logger, get_logger_with_context, init_logging, parse_log_level};
use tracing::Level;

#[test]
fn level_names_are_case_insensitive() {
    assert_eq!(parse_log_level("warn").unwrap(), Level::WARN);
    assert_eq!(parse_log_level("Trace").unwrap(), Level::TRACE);
    assert!(parse_log_level("loud").is_err());
}

#[test]
fn invalid_level_is_reported_by_init() {
    // Only the first init call takes effect in a process, so this test
    // owns initialization for this binary.
    let config = LoggingConfig {
        level: "LOUD".to_string(),
        ..Default::default()
    };
    assert!(init_logging(&config).is_err());

    // Loggers remain usable either way
    get_logger("tests").info("still logging");
    get_logger_with_context(LogContext::new("tests").with_session_id("s-1".to_string()))
        .warn("with context");
}
