use std::time::Duration;

use crate::capture::{
    config::{
        CaptureConfig, DEFAULT_BUFFER_SIZE, DEFAULT_JOIN_TIMEOUT_MS, DEFAULT_POLL_INTERVAL_MS,
        FlushMode, StreamSource,
    },
    error::CaptureError,
    flush::{FlushContext, FlushPolicy},
};

#[test]
fn defaults() {
    let config = CaptureConfig::default();
    assert_eq!(config.buffer_size, Some(DEFAULT_BUFFER_SIZE));
    assert_eq!(config.stdout_flush, Some(FlushMode::Never));
    assert_eq!(config.stderr_flush, Some(FlushMode::Never));
    assert_eq!(config.poll_interval_ms, Some(DEFAULT_POLL_INTERVAL_MS));
    assert_eq!(config.join_timeout_ms, Some(DEFAULT_JOIN_TIMEOUT_MS));
    assert_eq!(config.sample_interval_ms, None);
    assert_eq!(config.timeout_ms, None);
    assert!(config.validate().is_ok());
}

#[test]
fn builder() {
    let config = CaptureConfig::new()
        .buffer_size(8192)
        .stdout_flush(FlushMode::Always)
        .stderr_flush(FlushMode::EveryBytes(256))
        .poll_interval_ms(5)
        .join_timeout_ms(250)
        .sample_interval_ms(100)
        .timeout_ms(30_000);

    assert_eq!(config.buffer_size, Some(8192));
    assert_eq!(config.stdout_flush, Some(FlushMode::Always));
    assert_eq!(config.stderr_flush, Some(FlushMode::EveryBytes(256)));
    assert_eq!(config.poll_interval_ms, Some(5));
    assert_eq!(config.join_timeout_ms, Some(250));
    assert_eq!(config.sample_interval_ms, Some(100));
    assert_eq!(config.timeout_ms, Some(30_000));
    assert!(config.validate().is_ok());
}

#[test]
fn flush_sets_both_streams() {
    let config = CaptureConfig::new().flush(FlushMode::Always);
    assert_eq!(config.stdout_flush, Some(FlushMode::Always));
    assert_eq!(config.stderr_flush, Some(FlushMode::Always));
}

#[test]
fn unset_fields_fall_back_to_defaults() {
    let config = CaptureConfig {
        buffer_size: None,
        stdout_flush: None,
        stderr_flush: None,
        poll_interval_ms: None,
        join_timeout_ms: None,
        sample_interval_ms: None,
        timeout_ms: None,
    };
    assert!(config.validate().is_ok());
    assert_eq!(config.effective_buffer_size(), DEFAULT_BUFFER_SIZE);
    assert_eq!(
        config.effective_poll_interval(),
        Duration::from_millis(DEFAULT_POLL_INTERVAL_MS)
    );
    assert_eq!(
        config.effective_join_timeout(),
        Duration::from_millis(DEFAULT_JOIN_TIMEOUT_MS)
    );
    let busy = FlushContext {
        bytes_since_flush: 1 << 20,
        ..FlushContext::default()
    };
    assert!(!config.flush_policy(StreamSource::Stdout).should_flush(&busy));
}

#[test]
fn flush_policy_is_per_stream() {
    let config = CaptureConfig::new().stderr_flush(FlushMode::Always);
    let ctx = FlushContext::default();
    assert!(!config.flush_policy(StreamSource::Stdout).should_flush(&ctx));
    assert!(config.flush_policy(StreamSource::Stderr).should_flush(&ctx));
}

#[test]
fn reject_zero_buffer_size() {
    let err = CaptureConfig::new().buffer_size(0).validate().unwrap_err();
    assert_eq!(
        err,
        CaptureError::InvalidConfiguration("Buffer size must be greater than 0".to_string())
    );
}

#[test]
fn reject_zero_flush_threshold() {
    let err = CaptureConfig::new()
        .stdout_flush(FlushMode::EveryBytes(0))
        .validate()
        .unwrap_err();
    assert_eq!(
        err,
        CaptureError::InvalidConfiguration(
            "Flush threshold for stdout must be greater than 0".to_string()
        )
    );
}

#[test]
fn reject_zero_intervals() {
    let cases = [
        (CaptureConfig::new().poll_interval_ms(0), "Poll interval"),
        (CaptureConfig::new().join_timeout_ms(0), "Join timeout"),
        (CaptureConfig::new().sample_interval_ms(0), "Sample interval"),
        (CaptureConfig::new().timeout_ms(0), "Timeout"),
    ];
    for (config, name) in cases {
        assert_eq!(
            config.validate(),
            Err(CaptureError::InvalidConfiguration(format!(
                "{} must be greater than 0",
                name
            )))
        );
    }
}

#[test]
fn stream_source_display() {
    assert_eq!(StreamSource::Stdout.to_string(), "stdout");
    assert_eq!(StreamSource::Stderr.as_str(), "stderr");
    assert_eq!(StreamSource::default(), StreamSource::Stdout);
}

#[cfg(feature = "serde")]
#[test]
fn serde_round_trip() {
    let config = CaptureConfig::new()
        .stderr_flush(FlushMode::EveryBytes(4096))
        .timeout_ms(1500);

    let json = serde_json::to_string(&config).unwrap();
    let back: CaptureConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}

#[cfg(feature = "serde")]
#[test]
fn serde_missing_fields_use_defaults() {
    let config: CaptureConfig =
        serde_json::from_str(r#"{ "stdout_flush": "always", "buffer_size": 64 }"#).unwrap();
    assert_eq!(config.stdout_flush, Some(FlushMode::Always));
    assert_eq!(config.buffer_size, Some(64));
    assert_eq!(config.join_timeout_ms, Some(DEFAULT_JOIN_TIMEOUT_MS));
}
