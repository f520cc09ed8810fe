//! System configuration: dedup/replay windows, SLA deadlines, ladder depth,
//! and market-scoped rule toggles (spec §6 "Configuration").

use crate::core_types::MarketId;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-market overrides referenced by the rule engine and inventory engine.
/// `slab_cutoff`/`quanto_rules` are rule-id references, not inline logic:
/// the market-specific *behavior* lives in C8 rules, this struct only routes
/// to them (spec §4.4 "Per-market behaviors... embodied as rules, not code").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketRuleConfig {
    /// Whether a pay-to-hold counts against for-loan availability in this
    /// market (Open Question #2 — resolved per-market, not globally).
    pub include_pay_to_hold_in_for_loan: bool,
    /// Whether borrowed shares are excluded from for-loan (Taiwan = true).
    pub exclude_borrowed_from_for_loan: bool,
    /// Rule-id governing the SLAB cutoff vs outright cutoff split (Japan).
    pub slab_cutoff_rule: Option<String>,
    /// Rule-id governing quanto T+1 vs T+2 settlement treatment (Japan).
    pub quanto_rule: Option<String>,
}

impl Default for MarketRuleConfig {
    fn default() -> Self {
        Self {
            include_pay_to_hold_in_for_loan: false,
            exclude_borrowed_from_for_loan: false,
            slab_cutoff_rule: None,
            quanto_rule: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Dedup window for (source, event-id) fingerprints. Default 24h.
    pub dedup_window_secs: u64,
    /// Interval between drift-verification full recomputes. Default 5m.
    pub drift_check_interval_secs: u64,
    /// Locate request TTL; `None` means "end of current business date".
    pub locate_ttl_secs: Option<u64>,
    /// Short-sell validation hard deadline from ingress, in milliseconds.
    pub short_sell_deadline_ms: u64,
    /// Locate auto-rule evaluation deadline, in milliseconds.
    pub locate_rule_deadline_ms: u64,
    /// Settlement ladder depth (SD0..SD{N-1}).
    pub ladder_days: usize,
    /// Whether positions with unresolved-value-date corporate actions are
    /// included in totals by default (exclusion is still governed by rule).
    pub corporate_action_include_pending: bool,
    /// Consecutive failures before an event is diverted to the dead-letter
    /// stream.
    pub dlq_max_retries: u32,
    /// Per-market rule-scoping configuration.
    pub markets: FxHashMap<MarketId, MarketRuleConfig>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            dedup_window_secs: 24 * 3600,
            drift_check_interval_secs: 5 * 60,
            locate_ttl_secs: None,
            short_sell_deadline_ms: 150,
            locate_rule_deadline_ms: 50,
            ladder_days: crate::core_types::DEFAULT_LADDER_DAYS,
            corporate_action_include_pending: true,
            dlq_max_retries: 5,
            markets: FxHashMap::default(),
        }
    }
}

impl SystemConfig {
    pub fn dedup_window(&self) -> Duration {
        Duration::from_secs(self.dedup_window_secs)
    }

    pub fn drift_check_interval(&self) -> Duration {
        Duration::from_secs(self.drift_check_interval_secs)
    }

    pub fn short_sell_deadline(&self) -> Duration {
        Duration::from_millis(self.short_sell_deadline_ms)
    }

    pub fn locate_rule_deadline(&self) -> Duration {
        Duration::from_millis(self.locate_rule_deadline_ms)
    }

    pub fn market(&self, market: &MarketId) -> MarketRuleConfig {
        self.markets.get(market).cloned().unwrap_or_default()
    }

    /// Load from a TOML file, falling back to defaults for anything unset.
    pub fn load_from_path(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

/// Logging configuration, loaded alongside `SystemConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_dir: String,
    pub log_file: String,
    pub log_level: String,
    pub use_json: bool,
    pub rotation: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".to_string(),
            log_file: "prime-inventory.log".to_string(),
            log_level: "info".to_string(),
            use_json: false,
            rotation: "daily".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_defaults() {
        let cfg = SystemConfig::default();
        assert_eq!(cfg.dedup_window_secs, 24 * 3600);
        assert_eq!(cfg.short_sell_deadline_ms, 150);
        assert_eq!(cfg.locate_rule_deadline_ms, 50);
        assert_eq!(cfg.ladder_days, 5);
        assert_eq!(cfg.dlq_max_retries, 5);
        assert!(cfg.corporate_action_include_pending);
    }

    #[test]
    fn market_override_falls_back_to_default() {
        let mut cfg = SystemConfig::default();
        let tw: MarketId = "TW".into();
        cfg.markets.insert(
            tw.clone(),
            MarketRuleConfig {
                exclude_borrowed_from_for_loan: true,
                ..Default::default()
            },
        );
        assert!(cfg.market(&tw).exclude_borrowed_from_for_loan);
        let us: MarketId = "US".into();
        assert!(!cfg.market(&us).exclude_borrowed_from_for_loan);
    }
}
