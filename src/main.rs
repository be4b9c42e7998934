use clap::{Arg, Command};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use stink_bidder::{
    core::{
        state::{AccountState, MarketDataState},
        types::SymbolInfo,
    },
    exchanges::{spawn_random_walk_feed, PaperExchange},
    strategies::common::application::{
        deps::StrategyDepsBuilder,
        status::StrategyState,
        strategy::{Strategy, StrategyInstance},
    },
    strategies::stink_bid::{StinkBidConfig, StinkBidStrategy},
    utils::unified_logger::{init_strategy_logger, LogConfig},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载环境变量
    dotenv::dotenv().ok();

    // 解析命令行参数
    let matches = Command::new("stink-bidder")
        .version(env!("CARGO_PKG_VERSION"))
        .about("深度挂单做市程序")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("策略配置文件路径 (.yml/.yaml/.toml)")
                .required(true),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("覆盖配置中的日志级别"),
        )
        .arg(
            Arg::new("log-dir")
                .long("log-dir")
                .value_name("DIR")
                .default_value("logs")
                .help("日志根目录"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(clap::ArgAction::SetTrue)
                .help("只写日志文件，不输出到控制台"),
        )
        .get_matches();

    let config_file = matches
        .get_one::<String>("config")
        .ok_or("缺少 --config 参数")?;
    let config = StinkBidConfig::from_file(config_file)?;

    let log_level = matches
        .get_one::<String>("log-level")
        .cloned()
        .unwrap_or_else(|| config.strategy.log_level.clone());
    let log_config = LogConfig {
        root_dir: matches
            .get_one::<String>("log-dir")
            .cloned()
            .unwrap_or_else(|| "logs".to_string()),
        default_level: log_level,
        console_output: !matches.get_flag("quiet"),
    };
    let log_path = init_strategy_logger(&config.strategy.name, &log_config)?;

    log::info!(
        "启动策略: {} with config: {}",
        config.strategy.name,
        config_file
    );
    if let Some(path) = log_path {
        log::info!("日志文件: {}", path.display());
    }

    if config.trading.exchange != "paper" {
        return Err(format!(
            "不支持的交易所: {}（当前仅支持 paper 演练模式）",
            config.trading.exchange
        )
        .into());
    }

    // 共享状态与模拟交易所
    let market = Arc::new(MarketDataState::new());
    let account = Arc::new(AccountState::new());
    let exchange = Arc::new(PaperExchange::new(market.clone(), account.clone()));
    exchange
        .register_symbol(
            &config.trading.symbol,
            SymbolInfo {
                tick_size: config.paper.tick_size,
                step_size: config.paper.step_size,
            },
        )
        .await;

    let (feed_shutdown, feed_shutdown_rx) = watch::channel(false);
    let feed = spawn_random_walk_feed(
        exchange.clone(),
        config.trading.symbol.clone(),
        config.paper.initial_price,
        config.paper.volatility_bps,
        Duration::from_millis(config.paper.tick_interval_ms),
        feed_shutdown_rx,
    );

    let deps = StrategyDepsBuilder::new()
        .with_exchange(exchange.clone())
        .with_market_state(market.clone())
        .with_account_state(account.clone())
        .build()?;
    let strategy = StinkBidStrategy::create(config, deps)?;
    strategy.start().await?;

    // 保持运行直到收到停止信号或策略自行退出
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            log::info!("收到停止信号，正在关闭策略...");
        }
        state = strategy.wait_terminated() => {
            log::warn!("策略已自行退出，状态: {:?}", state);
        }
    }

    strategy.stop().await?;
    feed_shutdown.send_replace(true);
    if let Err(e) = feed.await {
        log::warn!("行情任务异常结束: {}", e);
    }

    let status = strategy.status().await?;
    log::info!("最终状态: {}", serde_json::to_string_pretty(&status)?);

    if status.state == StrategyState::Error {
        return Err(format!(
            "策略异常退出: {}",
            status.last_error.unwrap_or_default()
        )
        .into());
    }
    Ok(())
}
