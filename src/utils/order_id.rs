/// 订单ID生成器
///
/// 为做市任务生成唯一且可识别的客户端订单ID，
/// ID中编码了层级与方向，便于在成交回报中定位来源。
use chrono::Utc;
use std::sync::atomic::{AtomicU32, Ordering};

/// 交易所订单ID规则
#[derive(Debug, Clone)]
pub struct ExchangeOrderIdRules {
    pub max_length: usize,
    pub allow_underscore: bool,
    pub allow_dash: bool,
}

impl ExchangeOrderIdRules {
    /// Binance规则
    pub fn binance() -> Self {
        Self {
            max_length: 36,
            allow_underscore: false,
            allow_dash: false,
        }
    }

    /// Bybit规则
    pub fn bybit() -> Self {
        Self {
            max_length: 36,
            allow_underscore: true,
            allow_dash: true,
        }
    }

    pub fn for_exchange(exchange: &str) -> Self {
        match exchange.to_lowercase().as_str() {
            "bybit" | "paper" => Self::bybit(),
            _ => Self::binance(), // 默认使用最严格的规则
        }
    }
}

/// 订单ID生成器
#[derive(Debug)]
pub struct OrderIdGenerator {
    strategy_code: String,
    sequence: AtomicU32,
    rules: ExchangeOrderIdRules,
}

impl OrderIdGenerator {
    pub fn new(strategy_name: &str, exchange: &str) -> Self {
        Self {
            strategy_code: Self::strategy_code(strategy_name),
            sequence: AtomicU32::new(0),
            rules: ExchangeOrderIdRules::for_exchange(exchange),
        }
    }

    /// 生成带标签的订单ID
    /// 格式: [策略代码][标签][DDHHMMSS][序列号]
    pub fn generate_with_tag(&self, tag: &str) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let timestamp = Utc::now().format("%d%H%M%S");

        // 清理标签（只保留字母数字）
        let clean_tag: String = tag
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(6)
            .collect();

        let separator = if self.rules.allow_dash { "-" } else { "" };
        let mut order_id = format!(
            "{}{}{}{}{}{:05}",
            self.strategy_code,
            separator,
            clean_tag,
            separator,
            timestamp,
            seq % 100_000
        );

        if order_id.len() > self.rules.max_length {
            order_id.truncate(self.rules.max_length);
        }

        order_id
    }

    /// 策略代码：取每个单词的首字母
    fn strategy_code(strategy_name: &str) -> String {
        let code: String = strategy_name
            .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
            .filter_map(|w| w.chars().next())
            .filter(|c| c.is_ascii_alphanumeric())
            .take(3)
            .collect::<String>()
            .to_uppercase();
        if code.is_empty() {
            "X".to_string()
        } else {
            code
        }
    }
}
