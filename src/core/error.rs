use thiserror::Error;

/// 下单/撤单执行错误
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("订单被拒绝: {symbol} - {reason}")]
    Rejected { symbol: String, reason: String },

    #[error("网络错误: {0}")]
    Network(String),

    #[error("交易对未找到: {0}")]
    SymbolNotFound(String),

    #[error("订单未找到: ID {order_id} (交易对: {symbol})")]
    OrderNotFound { order_id: String, symbol: String },

    #[error("无效数量: {symbol} 数量 {amount}")]
    InvalidQuantity { symbol: String, amount: f64 },

    #[error("超时错误: 操作 '{operation}' 超时 ({timeout_ms}毫秒)")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("其他错误: {0}")]
    Other(String),
}

impl ExecutionError {
    /// 判断错误是否可以重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExecutionError::Network(_) | ExecutionError::Timeout { .. }
        )
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ExecutionError::Network(_) => ErrorSeverity::Warning,
            ExecutionError::Timeout { .. } => ErrorSeverity::Warning,
            ExecutionError::OrderNotFound { .. } => ErrorSeverity::Info,
            ExecutionError::SymbolNotFound(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,     // 信息性错误，通常不影响操作
    Warning,  // 警告性错误，可以重试
    Error,    // 一般错误，需要用户处理
    Critical, // 严重错误，需要立即处理
}

/// 配置加载错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("读取配置文件失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML配置错误: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML配置错误: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("参数验证错误: {field} - {reason}")]
    Validation { field: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_errors_are_retryable() {
        assert!(ExecutionError::Network("reset".to_string()).is_retryable());
        assert!(!ExecutionError::Rejected {
            symbol: "BTCUSDT".to_string(),
            reason: "insufficient margin".to_string(),
        }
        .is_retryable());
    }

    #[test]
    fn severity_mapping() {
        assert_eq!(
            ExecutionError::SymbolNotFound("X".to_string()).severity(),
            ErrorSeverity::Critical
        );
        assert_eq!(
            ExecutionError::Other("boom".to_string()).severity(),
            ErrorSeverity::Error
        );
    }
}
