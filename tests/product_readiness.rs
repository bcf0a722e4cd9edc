use payouts::config::{AppConfig, ProviderKind};

#[test]
fn defaults_are_usable_without_env() {
    let cfg = AppConfig::from_env();
    assert!(!cfg.api_key.is_empty());
    assert!(cfg.resolution_batch_size > 0);

    let settings = cfg.service_settings();
    assert!(settings.request_timeout.as_millis() > 0);
    assert!(settings.resolution_timeout.as_millis() > 0);
}

#[test]
fn mock_is_the_default_provider() {
    if std::env::var("PAYOUT_PROVIDER").is_err() {
        assert_eq!(AppConfig::from_env().provider, ProviderKind::Mock);
    }
}
