pub mod application;

pub use application::{
    Strategy, StrategyDeps, StrategyDepsBuilder, StrategyInstance, StrategyPosition,
    StrategyState, StrategyStatus,
};
