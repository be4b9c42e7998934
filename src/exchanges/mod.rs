// 交易所实现
pub mod paper;

pub use paper::{spawn_random_walk_feed, PaperExchange};
