// 工具模块 - 通用工具函数
pub mod order_id;
pub mod precision;
pub mod unified_logger;

pub use order_id::OrderIdGenerator;
pub use precision::{ceil_to_step, floor_to_step, round_price_for_side};
pub use unified_logger::{get_strategy_log_path, init_strategy_logger, LogConfig};
