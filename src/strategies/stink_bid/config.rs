use crate::core::config::load_config_file;
use crate::core::error::ConfigError;
use crate::core::types::OrderSide;
use crate::utils::precision::round_price_for_side;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// 深度挂单（stink bid）做市策略配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StinkBidConfig {
    /// 策略基本信息
    pub strategy: StrategyMeta,

    /// 交易配置
    pub trading: TradingConfig,

    /// 循环节奏
    #[serde(default)]
    pub timing: TimingConfig,

    /// 挂单层级（每层买卖各一个任务）
    pub levels: Vec<LevelParams>,

    /// 执行配置
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// 模拟撮合参数（演练模式）
    #[serde(default)]
    pub paper: PaperConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyMeta {
    /// 策略名称
    #[serde(default = "default_strategy_name")]
    pub name: String,
    /// 是否启用
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// 交易对
    pub symbol: String,
    /// 交易所
    #[serde(default = "default_exchange")]
    pub exchange: String,
}

/// 循环节奏配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// 启动预热时间(秒)，等待行情与账户数据就绪
    #[serde(default = "default_warmup_secs")]
    pub warmup_secs: u64,
    /// 每轮挂单存活时间(秒)
    #[serde(default = "default_cycle_window_secs")]
    pub cycle_window_secs: u64,
    /// 守卫动作后、派发任务前的等待(毫秒)
    #[serde(default = "default_settle_ms")]
    pub guard_settle_ms: u64,
    /// 撤销任务后、下一轮检查前的等待(毫秒)
    #[serde(default = "default_settle_ms")]
    pub settle_delay_ms: u64,
}

impl TimingConfig {
    pub fn warmup_delay(&self) -> Duration {
        Duration::from_secs(self.warmup_secs)
    }

    pub fn cycle_window(&self) -> Duration {
        Duration::from_secs(self.cycle_window_secs)
    }

    pub fn guard_settle_delay(&self) -> Duration {
        Duration::from_millis(self.guard_settle_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            warmup_secs: default_warmup_secs(),
            cycle_window_secs: default_cycle_window_secs(),
            guard_settle_ms: default_settle_ms(),
            settle_delay_ms: default_settle_ms(),
        }
    }
}

/// 单个层级参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelParams {
    /// 层级名称（日志与订单ID标签）
    pub name: String,
    /// 距参考价的距离(基点)
    pub distance_bps: f64,
    /// 下单数量(基础货币)
    pub quantity: f64,
    /// 价格偏离超过该基点数时重新挂单
    #[serde(default = "default_reprice_bps")]
    pub reprice_bps: f64,
}

impl LevelParams {
    /// 目标挂单价：买单在中间价下方，卖单在上方，按最小价格变动取整
    pub fn target_price(&self, mid_price: f64, side: OrderSide, tick_size: f64) -> f64 {
        let offset = self.distance_bps / 10_000.0;
        let raw = match side {
            OrderSide::Buy => mid_price * (1.0 - offset),
            OrderSide::Sell => mid_price * (1.0 + offset),
        };
        round_price_for_side(raw, tick_size, side)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// 任务检查间隔(毫秒)
    #[serde(default = "default_worker_poll_ms")]
    pub worker_poll_ms: u64,
    /// 挂单是否 post-only
    #[serde(default = "default_true")]
    pub post_only: bool,
    /// 启动时全撤
    #[serde(default = "default_true")]
    pub startup_cancel_all: bool,
    /// 停止时全撤
    #[serde(default = "default_true")]
    pub shutdown_cancel_all: bool,
    /// 停止时等待主循环退出的最长时间(秒)
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
}

impl ExecutionConfig {
    pub fn worker_poll_interval(&self) -> Duration {
        Duration::from_millis(self.worker_poll_ms)
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            worker_poll_ms: default_worker_poll_ms(),
            post_only: true,
            startup_cancel_all: true,
            shutdown_cancel_all: true,
            stop_timeout_secs: default_stop_timeout_secs(),
        }
    }
}

/// 模拟撮合参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperConfig {
    pub initial_price: f64,
    pub tick_size: f64,
    pub step_size: f64,
    /// 每次行情跳动的最大幅度(基点)
    pub volatility_bps: f64,
    /// 行情跳动间隔(毫秒)
    pub tick_interval_ms: u64,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            initial_price: 100.0,
            tick_size: 0.01,
            step_size: 0.001,
            volatility_bps: 20.0,
            tick_interval_ms: 250,
        }
    }
}

fn default_strategy_name() -> String {
    "stink_bid".to_string()
}

fn default_exchange() -> String {
    "paper".to_string()
}

fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_true() -> bool {
    true
}

fn default_warmup_secs() -> u64 {
    5
}

fn default_cycle_window_secs() -> u64 {
    30
}

fn default_settle_ms() -> u64 {
    500
}

fn default_reprice_bps() -> f64 {
    5.0
}

fn default_worker_poll_ms() -> u64 {
    1000
}

fn default_stop_timeout_secs() -> u64 {
    10
}

impl StinkBidConfig {
    /// 从文件加载并校验
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: StinkBidConfig = load_config_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// 每轮派发的任务数
    pub fn workers_per_cycle(&self) -> usize {
        self.levels.len() * 2
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trading.symbol.trim().is_empty() {
            return Err(ConfigError::invalid("trading.symbol", "交易对不能为空"));
        }
        if self.levels.is_empty() {
            return Err(ConfigError::invalid("levels", "至少需要一个层级"));
        }
        if self.timing.cycle_window_secs == 0 {
            return Err(ConfigError::invalid(
                "timing.cycle_window_secs",
                "挂单窗口必须大于0",
            ));
        }
        if self.execution.worker_poll_ms == 0 {
            return Err(ConfigError::invalid(
                "execution.worker_poll_ms",
                "检查间隔必须大于0",
            ));
        }

        let mut names = HashSet::new();
        for (idx, level) in self.levels.iter().enumerate() {
            let field = format!("levels[{}]", idx);
            if level.name.trim().is_empty() {
                return Err(ConfigError::invalid(field, "层级名称不能为空"));
            }
            if !names.insert(level.name.as_str()) {
                return Err(ConfigError::invalid(
                    field,
                    format!("层级名称重复: {}", level.name),
                ));
            }
            if !(level.distance_bps > 0.0 && level.distance_bps < 10_000.0) {
                return Err(ConfigError::invalid(
                    field,
                    format!("distance_bps 必须在 (0, 10000) 内: {}", level.distance_bps),
                ));
            }
            if !(level.quantity > 0.0) {
                return Err(ConfigError::invalid(
                    field,
                    format!("quantity 必须大于0: {}", level.quantity),
                ));
            }
            if level.reprice_bps < 0.0 {
                return Err(ConfigError::invalid(field, "reprice_bps 不能为负"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{parse_config_str, ConfigFormat};

    const SAMPLE: &str = r#"
strategy:
  name: stink_bid_btc
trading:
  symbol: BTCUSDT
levels:
  - name: L1
    distance_bps: 150
    quantity: 0.01
  - name: L2
    distance_bps: 400
    quantity: 0.02
    reprice_bps: 20
"#;

    #[test]
    fn yaml_defaults_follow_source_timings() {
        let config: StinkBidConfig = parse_config_str(SAMPLE, ConfigFormat::Yaml).unwrap();
        config.validate().unwrap();

        assert_eq!(config.timing.warmup_delay(), Duration::from_secs(5));
        assert_eq!(config.timing.cycle_window(), Duration::from_secs(30));
        assert_eq!(config.timing.guard_settle_delay(), Duration::from_millis(500));
        assert_eq!(config.timing.settle_delay(), Duration::from_millis(500));
        assert_eq!(config.workers_per_cycle(), 4);
        assert_eq!(config.levels[0].reprice_bps, 5.0);
        assert_eq!(config.trading.exchange, "paper");
        assert!(config.execution.startup_cancel_all);
    }

    #[test]
    fn toml_is_accepted() {
        let toml_text = r#"
[strategy]
name = "stink_bid_eth"

[trading]
symbol = "ETHUSDT"

[timing]
cycle_window_secs = 10

[[levels]]
name = "near"
distance_bps = 50.0
quantity = 0.1
"#;
        let config: StinkBidConfig = parse_config_str(toml_text, ConfigFormat::Toml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.timing.cycle_window(), Duration::from_secs(10));
        assert_eq!(config.levels.len(), 1);
    }

    #[test]
    fn validation_rejects_bad_levels() {
        let mut config: StinkBidConfig = parse_config_str(SAMPLE, ConfigFormat::Yaml).unwrap();
        config.levels[1].name = "L1".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation { .. })
        ));

        let mut config: StinkBidConfig = parse_config_str(SAMPLE, ConfigFormat::Yaml).unwrap();
        config.levels[0].quantity = 0.0;
        assert!(config.validate().is_err());

        let mut config: StinkBidConfig = parse_config_str(SAMPLE, ConfigFormat::Yaml).unwrap();
        config.levels.clear();
        assert!(config.validate().is_err());

        let mut config: StinkBidConfig = parse_config_str(SAMPLE, ConfigFormat::Yaml).unwrap();
        config.timing.cycle_window_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn target_price_brackets_mid() {
        let level = LevelParams {
            name: "L1".to_string(),
            distance_bps: 100.0,
            quantity: 1.0,
            reprice_bps: 5.0,
        };
        let bid = level.target_price(200.0, OrderSide::Buy, 0.01);
        let ask = level.target_price(200.0, OrderSide::Sell, 0.01);
        assert!((bid - 198.0).abs() < 1e-9);
        assert!((ask - 202.0).abs() < 1e-9);
    }
}
