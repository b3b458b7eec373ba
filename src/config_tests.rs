//! Tests for configuration

#[cfg(test)]
mod tests {
    use super::super::config::*;
    use crate::error::BotError;
    use rust_decimal_macros::dec;
    use std::io::Write;

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.tick_interval_ms, 3_000);
        assert_eq!(config.scan_interval_ms, 45_000);
        assert_eq!(config.volatility, 0.0025);
        assert_eq!(config.drift_center, 0.53);
        assert_eq!(config.allocation_pct, dec!(0.08));
        assert_eq!(config.leverage_cap, 10);
        assert_eq!(config.scan_max_open, 3);
        assert_eq!(config.notification_capacity, 30);
        assert_eq!(config.handshake_latency_ms, 1_800);
        assert_eq!(config.broker_policy, BrokerPolicy::FirstConnected);
    }

    #[test]
    fn test_risk_config_default() {
        let config = RiskConfig::default();
        assert_eq!(config.max_leverage, 10);
        assert_eq!(config.default_stop_loss, dec!(2));
        assert_eq!(config.default_take_profit, dec!(5));
        assert!(config.is_percentage);
        assert!(!config.trading_enabled);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.engine.tick_interval_ms, 3_000);
        assert_eq!(config.risk, RiskConfig::default());
        assert_eq!(config.storage.backend, StorageBackend::Json);
        assert!(!config.storage.reset_on_corrupt);
        assert!(config.llm.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_sections() {
        let toml_str = r#"
[engine]
scan_interval_ms = 10000
broker_policy = "match_asset_class"

[risk]
max_leverage = 25
is_percentage = false

[storage]
backend = "sqlite"
path = "/tmp/gix.db"
reset_on_corrupt = true

[llm]
provider = "deepseek"
api_key = "sk-test"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.engine.scan_interval_ms, 10_000);
        assert_eq!(config.engine.tick_interval_ms, 3_000);
        assert_eq!(config.engine.broker_policy, BrokerPolicy::MatchAssetClass);
        assert_eq!(config.risk.max_leverage, 25);
        assert!(!config.risk.is_percentage);
        assert_eq!(config.risk.default_stop_loss, dec!(2));
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert!(config.storage.reset_on_corrupt);

        let llm = config.llm.unwrap();
        assert_eq!(llm.provider, "deepseek");
        assert!(llm.model.is_none());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.risk.max_leverage = MAX_LEVERAGE_LIMIT + 1;
        assert!(matches!(config.validate(), Err(BotError::Config(_))));

        let mut config = Config::default();
        config.engine.drift_center = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.engine.allocation_pct = dec!(0);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.engine.tick_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.engine.scan_interval_ms = u64::MAX;
        assert!(matches!(config.validate(), Err(BotError::Config(_))));
        config.engine.scan_interval_ms = MAX_SCAN_INTERVAL_MS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_storage_path_expands_home() {
        let storage = StorageConfig::default();
        let path = storage.resolved_path().unwrap();
        assert!(!path.to_string_lossy().starts_with('~'));
        assert!(path.ends_with(".gentle_gix/state.json"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[risk]\nmax_leverage = 40\n\n[storage]\nbackend = \"memory\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.risk.max_leverage, 40);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.engine.scan_interval_ms, 45_000);
    }
}
