//! 统一日志管理模块
//! 基于 log + env_logger，控制台或按日文件输出

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub root_dir: String,
    pub default_level: String,
    pub console_output: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            root_dir: "logs".to_string(),
            default_level: "INFO".to_string(),
            console_output: true,
        }
    }
}

/// 获取策略的当前日志文件路径
pub fn get_strategy_log_path(root_dir: &str, strategy_name: &str) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d");
    PathBuf::from(format!(
        "{}/strategies/{}_{}.log",
        root_dir, strategy_name, timestamp
    ))
}

/// 初始化策略日志系统
///
/// `RUST_LOG` 优先于配置中的级别。关闭控制台输出时写入
/// `{root_dir}/strategies/{策略名}_{YYYYMMDD}.log` 并返回该路径；
/// 输出到控制台时返回 None。
pub fn init_strategy_logger(
    strategy_name: &str,
    config: &LogConfig,
) -> Result<Option<PathBuf>, Box<dyn std::error::Error>> {
    let mut builder = build_logger(config);
    let log_path = if config.console_output {
        None
    } else {
        let log_path = get_strategy_log_path(&config.root_dir, strategy_name);
        if let Some(dir) = log_path.parent() {
            if !Path::new(dir).exists() {
                fs::create_dir_all(dir)?;
            }
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
        Some(log_path)
    };

    builder.try_init()?;
    Ok(log_path)
}

fn build_logger(config: &LogConfig) -> env_logger::Builder {
    let env = env_logger::Env::default().filter_or("RUST_LOG", config.default_level.as_str());
    let mut builder = env_logger::Builder::from_env(env);
    builder.format(|buf, record| {
        writeln!(
            buf,
            "[{}] [{}] [{}] {}",
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        )
    });

    builder
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_path_layout() {
        let path = get_strategy_log_path("logs", "stink_bid");
        let text = path.to_string_lossy();
        assert!(text.starts_with("logs/strategies/stink_bid_"));
        assert!(text.ends_with(".log"));
    }

    #[test]
    fn console_logging_reports_no_file() {
        let root = std::env::temp_dir().join("stink_bidder_console_log");
        let config = LogConfig {
            root_dir: root.to_string_lossy().into_owned(),
            ..LogConfig::default()
        };

        let path = init_strategy_logger("stink_bid", &config).unwrap();
        assert!(path.is_none());
        assert!(!root.join("strategies").exists());
    }
}
