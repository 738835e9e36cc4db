//! Engine configuration settings and environment variable handling

use alloy::primitives::Address;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use std::cell::RefCell;
use std::env;
use std::str::FromStr;
use crate::{
    errors::{BotError, BotResult},
    types::{
        AssetPair, RouterFlavor, TokenInfo, Venue, DEFAULT_VENUES, WAVAX_MAINNET, WETH_E_MAINNET,
    },
};

// Configuration constants
pub const MIN_VENUES: usize = 2;
pub const DEFAULT_SLIPPAGE_STEP: Decimal = dec!(0.1);
pub const MAX_SLIPPAGE_CEILING: Decimal = dec!(50);
pub const SLIPPAGE_DECIMALS: u32 = 4;
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_MAX_CYCLE_WAIT_SECS: u64 = 1200; // 20 minutes
pub const DEFAULT_SESSION_DURATION_MINS: i64 = 30;
pub const DEFAULT_GAS_RESERVE: Decimal = dec!(0.2);
pub const DEFAULT_MIN_BASE_BALANCE: Decimal = dec!(1.5);

// Swap submission constants
pub const DEFAULT_SWAP_DEADLINE_SECS: u64 = 1200;
pub const DEFAULT_GAS_LIMIT_BUFFER_PCT: u64 = 10;
pub const TOKEN_DECIMALS: u8 = 18;

#[derive(Debug, Clone, PartialEq)]
pub struct VenueSettings {
    pub id: String,
    pub pair: Option<Address>,
    pub router: Option<Address>,
    pub flavor: RouterFlavor,
}

#[derive(Debug, Clone)]
pub struct Config {
    // Chain access
    pub rpc_url: Option<String>,
    pub private_key: Option<String>,
    pub explorer_tx_url: String,
    // Account
    pub account_email: String,
    // Pair and venues
    pub base_symbol: String,
    pub base_token: Address,
    pub quote_symbol: String,
    pub quote_token: Address,
    pub venues: Vec<VenueSettings>,
    // Strategy
    pub min_difference_threshold: Decimal,
    pub slippage_start: Decimal,
    pub max_slippage: Decimal,
    pub slippage_step: Decimal,
    pub gas_reserve: Decimal,
    pub min_base_balance: Decimal,
    // Scheduling
    pub tick_interval_secs: u64,
    pub session_duration_mins: i64,
    pub max_cycle_wait_secs: u64,
    // Swap submission
    pub swap_deadline_secs: u64,
    pub gas_limit_buffer_pct: u64,
    // Notifications
    pub notify_on_abandon: bool,
    pub telegram_api_key: Option<String>,
    pub telegram_group_id: Option<String>,
    pub telegram_api_url: String,
    // Output
    pub output_dir: String,
    /// `(key, raw value)` pairs that were set but did not parse.
    pub invalid_values: Vec<(String, String)>,
}

impl Config {
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Missing values take
    /// their defaults; values that fail to parse are kept in
    /// `invalid_values` and rejected by `validate_strategy`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader::new(lookup);

        let venue_ids: Vec<String> = env
            .raw("VENUES")
            .map(|s| {
                s.split(',')
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| DEFAULT_VENUES.iter().map(|v| v.to_string()).collect());

        let venues = venue_ids
            .into_iter()
            .map(|id| {
                let prefix = venue_env_prefix(&id);
                let default_flavor = if id == "sushi" { RouterFlavor::Eth } else { RouterFlavor::Avax };
                VenueSettings {
                    pair: env.parse(&format!("{}_PAIR_ADDRESS", prefix)),
                    router: env.parse(&format!("{}_ROUTER_ADDRESS", prefix)),
                    flavor: env.parse_or(&format!("{}_ROUTER_FLAVOR", prefix), default_flavor),
                    id,
                }
            })
            .collect();

        Self {
            rpc_url: env.raw("MAINNET_RPC_PROVIDER"),
            private_key: env.raw("PRIVATE_KEY"),
            explorer_tx_url: env
                .raw("EXPLORER_TX_URL")
                .unwrap_or_else(|| "https://snowtrace.io/tx/".to_string()),
            account_email: env
                .raw("ACCOUNT_EMAIL")
                .unwrap_or_else(|| "operator@localhost".to_string()),
            base_symbol: env.raw("BASE_SYMBOL").unwrap_or_else(|| "AVAX".to_string()),
            base_token: env.parse_or("WAVAX_ADDRESS", WAVAX_MAINNET),
            quote_symbol: env.raw("QUOTE_SYMBOL").unwrap_or_else(|| "WETH".to_string()),
            quote_token: env.parse_or("WETH_ADDRESS", WETH_E_MAINNET),
            venues,
            min_difference_threshold: env.parse_or("MIN_DIFFERENCE", dec!(1.0)),
            slippage_start: env.parse_or("SLIPPAGE_START", dec!(0.5)),
            max_slippage: env.parse_or("MAX_SLIPPAGE", dec!(1.0)),
            slippage_step: env.parse_or("SLIPPAGE_STEP", DEFAULT_SLIPPAGE_STEP),
            gas_reserve: env.parse_or("GAS_RESERVE", DEFAULT_GAS_RESERVE),
            min_base_balance: env.parse_or("MIN_BASE_BALANCE", DEFAULT_MIN_BASE_BALANCE),
            tick_interval_secs: env.parse_or("TICK_INTERVAL_SECONDS", DEFAULT_TICK_INTERVAL_SECS),
            session_duration_mins: env.parse_or("SESSION_DURATION_MINUTES", DEFAULT_SESSION_DURATION_MINS),
            max_cycle_wait_secs: env.parse_or("MAX_WAIT_SECONDS", DEFAULT_MAX_CYCLE_WAIT_SECS),
            swap_deadline_secs: env.parse_or("SWAP_DEADLINE_SECONDS", DEFAULT_SWAP_DEADLINE_SECS),
            gas_limit_buffer_pct: env.parse_or("GAS_LIMIT_BUFFER_PCT", DEFAULT_GAS_LIMIT_BUFFER_PCT),
            notify_on_abandon: env.parse_or("NOTIFY_ON_ABANDON", false),
            telegram_api_key: env.raw("TELEGRAM_API_KEY"),
            telegram_group_id: env.raw("TELEGRAM_GROUP_ID"),
            telegram_api_url: env
                .raw("TELEGRAM_API_URL")
                .unwrap_or_else(|| "https://api.telegram.org".to_string()),
            output_dir: env.raw("OUTPUT_DIR").unwrap_or_else(|| "output".to_string()),
            invalid_values: env.into_invalid(),
        }
    }

    /// Checks everything a session needs before the first cycle is scheduled.
    pub fn validate(&self) -> BotResult<()> {
        if self.rpc_url.as_deref().is_none_or(str::is_empty) {
            return Err(BotError::config("MAINNET_RPC_PROVIDER", "RPC endpoint is required"));
        }
        if self.private_key.as_deref().is_none_or(str::is_empty) {
            return Err(BotError::config("PRIVATE_KEY", "signing key is required"));
        }
        self.validate_strategy()?;
        self.venue_set().map(|_| ())
    }

    /// Numeric checks only; usable without chain credentials.
    pub fn validate_strategy(&self) -> BotResult<()> {
        if let Some((key, raw)) = self.invalid_values.first() {
            return Err(BotError::config(key.as_str(), format!("cannot parse '{}'", raw)));
        }
        if self.min_difference_threshold <= Decimal::ZERO {
            return Err(BotError::config("MIN_DIFFERENCE", "threshold must be positive"));
        }
        if self.slippage_start < Decimal::ZERO {
            return Err(BotError::config("SLIPPAGE_START", "must not be negative"));
        }
        if self.slippage_step <= Decimal::ZERO {
            return Err(BotError::config("SLIPPAGE_STEP", "step must be positive"));
        }
        if self.max_slippage < self.slippage_start {
            return Err(BotError::config(
                "MAX_SLIPPAGE",
                format!("ceiling {} is below start {}", self.max_slippage, self.slippage_start),
            ));
        }
        if self.max_slippage > MAX_SLIPPAGE_CEILING {
            return Err(BotError::config(
                "MAX_SLIPPAGE",
                format!("ceiling {} exceeds {}", self.max_slippage, MAX_SLIPPAGE_CEILING),
            ));
        }
        if self.gas_reserve < Decimal::ZERO {
            return Err(BotError::config("GAS_RESERVE", "must not be negative"));
        }
        if self.tick_interval_secs == 0 {
            return Err(BotError::config("TICK_INTERVAL_SECONDS", "interval must be positive"));
        }
        if self.session_duration_mins <= 0 {
            return Err(BotError::config("SESSION_DURATION_MINUTES", "duration must be positive"));
        }
        if self.base_token == self.quote_token {
            return Err(BotError::config("WETH_ADDRESS", "base and quote tokens must differ"));
        }
        Ok(())
    }

    /// Resolves the configured venues, failing on missing pair or router addresses.
    pub fn venue_set(&self) -> BotResult<Vec<Venue>> {
        if self.venues.len() < MIN_VENUES {
            return Err(BotError::config(
                "VENUES",
                format!("{} venue(s) configured, at least {} required", self.venues.len(), MIN_VENUES),
            ));
        }

        self.venues
            .iter()
            .map(|v| {
                let prefix = venue_env_prefix(&v.id);
                let pair = v.pair.ok_or_else(|| {
                    BotError::config(format!("{}_PAIR_ADDRESS", prefix), "missing or invalid address")
                })?;
                let router = v.router.ok_or_else(|| {
                    BotError::config(format!("{}_ROUTER_ADDRESS", prefix), "missing or invalid address")
                })?;
                Ok(Venue {
                    id: v.id.clone(),
                    pair,
                    router,
                    flavor: v.flavor,
                    base_is_token0: true,
                })
            })
            .collect()
    }

    pub fn asset_pair(&self) -> AssetPair {
        AssetPair {
            base: TokenInfo {
                symbol: self.base_symbol.clone(),
                address: self.base_token,
                decimals: TOKEN_DECIMALS,
            },
            quote: TokenInfo {
                symbol: self.quote_symbol.clone(),
                address: self.quote_token,
                decimals: TOKEN_DECIMALS,
            },
        }
    }
}

/// Key lookup that remembers which set values failed to parse.
struct EnvReader<F> {
    lookup: F,
    invalid: RefCell<Vec<(String, String)>>,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn new(lookup: F) -> Self {
        Self {
            lookup,
            invalid: RefCell::new(Vec::new()),
        }
    }

    /// Trimmed value; blank counts as unset.
    fn raw(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn parse<T: FromStr>(&self, key: &str) -> Option<T> {
        let raw = self.raw(key)?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                self.invalid.borrow_mut().push((key.to_string(), raw));
                None
            }
        }
    }

    fn parse_or<T: FromStr>(&self, key: &str, default: T) -> T {
        self.parse(key).unwrap_or(default)
    }

    fn into_invalid(self) -> Vec<(String, String)> {
        self.invalid.into_inner()
    }
}

/// `trader-joe` → `TRADER_JOE`
pub fn venue_env_prefix(id: &str) -> String {
    id.trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn full_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("MAINNET_RPC_PROVIDER", "http://localhost:8545"),
            ("PRIVATE_KEY", "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d"),
            ("MIN_DIFFERENCE", "2"),
            ("SLIPPAGE_START", "0.5"),
            ("MAX_SLIPPAGE", "1.0"),
            ("VENUES", "trader-joe, sushi"),
            ("TRADER_JOE_PAIR_ADDRESS", "0xFE15c2695F1F920da45C30AAE47d11dE51007AF9"),
            ("TRADER_JOE_ROUTER_ADDRESS", "0x60aE616a2155Ee3d9A68541Ba4544862310933d4"),
            ("SUSHI_PAIR_ADDRESS", "0x2B4C6E7d6f59e2D11E0C6B7e0bF3d3d0aC1d3b70"),
            ("SUSHI_ROUTER_ADDRESS", "0x1b02dA8Cb0d097eB8D57A175b88c7D8b47997506"),
        ]
    }

    #[test]
    fn defaults_match_reference_deployment() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config.slippage_step, dec!(0.1));
        assert_eq!(config.tick_interval_secs, 5);
        assert_eq!(config.max_cycle_wait_secs, 1200);
        assert_eq!(config.gas_reserve, dec!(0.2));
        assert_eq!(config.venues.len(), 3);
        assert_eq!(config.venues[2].flavor, RouterFlavor::Eth);
        assert_eq!(config.venues[0].flavor, RouterFlavor::Avax);
    }

    #[test]
    fn full_environment_validates() {
        let config = Config::from_lookup(lookup_from(&full_env()));
        config.validate().unwrap();
        let venues = config.venue_set().unwrap();
        assert_eq!(venues.len(), 2);
        assert_eq!(venues[0].id, "trader-joe");
        assert_eq!(config.min_difference_threshold, dec!(2));
    }

    #[test]
    fn missing_router_is_a_config_error() {
        let env: Vec<_> = full_env()
            .into_iter()
            .filter(|(k, _)| *k != "SUSHI_ROUTER_ADDRESS")
            .collect();
        let err = Config::from_lookup(lookup_from(&env)).validate().unwrap_err();
        match err {
            BotError::Config { field, .. } => assert_eq!(field, "SUSHI_ROUTER_ADDRESS"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn ceiling_below_start_is_rejected() {
        let mut env = full_env();
        env.push(("MAX_SLIPPAGE", "0.2"));
        let config = Config::from_lookup(lookup_from(&env));
        assert!(matches!(config.validate_strategy(), Err(BotError::Config { .. })));
    }

    #[test]
    fn unparseable_values_are_rejected_not_defaulted() {
        let mut env = full_env();
        env.retain(|(k, _)| *k != "MIN_DIFFERENCE" && *k != "MAX_SLIPPAGE");
        env.push(("MIN_DIFFERENCE", "two-percent"));
        env.push(("MAX_SLIPPAGE", "1,5"));
        let config = Config::from_lookup(lookup_from(&env));

        assert_eq!(config.invalid_values.len(), 2);
        match config.validate() {
            Err(BotError::Config { field, reason }) => {
                assert_eq!(field, "MIN_DIFFERENCE");
                assert!(reason.contains("two-percent"));
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_router_flavor_is_rejected() {
        let mut env = full_env();
        env.push(("SUSHI_ROUTER_FLAVOR", "uniswap"));
        let config = Config::from_lookup(lookup_from(&env));
        assert!(matches!(
            config.validate_strategy(),
            Err(BotError::Config { field, .. }) if field == "SUSHI_ROUTER_FLAVOR"
        ));
    }

    #[test]
    fn zero_slippage_step_is_rejected() {
        let mut env = full_env();
        env.push(("SLIPPAGE_STEP", "0"));
        let config = Config::from_lookup(lookup_from(&env));
        assert!(matches!(
            config.validate_strategy(),
            Err(BotError::Config { field, .. }) if field == "SLIPPAGE_STEP"
        ));
    }

    #[test]
    fn single_venue_is_rejected() {
        let mut env = full_env();
        env.retain(|(k, _)| *k != "VENUES");
        env.push(("VENUES", "trader-joe"));
        let config = Config::from_lookup(lookup_from(&env));
        assert!(matches!(config.venue_set(), Err(BotError::Config { field, .. }) if field == "VENUES"));
    }

    #[test]
    fn venue_prefix_is_env_friendly() {
        assert_eq!(venue_env_prefix("trader-joe"), "TRADER_JOE");
        assert_eq!(venue_env_prefix("sushi"), "SUSHI");
    }
}
