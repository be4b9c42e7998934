use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// 策略运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StrategyState {
    Initializing,
    Running,
    Stopped,
    Error,
}

impl StrategyState {
    pub fn is_terminal(self) -> bool {
        matches!(self, StrategyState::Stopped | StrategyState::Error)
    }
}

/// 策略的简要持仓信息
#[derive(Debug, Clone, Default, Serialize)]
pub struct StrategyPosition {
    pub symbol: String,
    pub net_position: f64,
    pub open_orders: usize,
}

/// 统一的策略状态结构
#[derive(Debug, Clone, Serialize)]
pub struct StrategyStatus {
    pub name: String,
    pub state: StrategyState,
    pub uptime: Option<Duration>,
    /// 主循环当前阶段
    pub phase: Option<String>,
    pub cycles_completed: u64,
    pub positions: Vec<StrategyPosition>,
    pub updated_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

impl StrategyStatus {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: StrategyState::Initializing,
            uptime: None,
            phase: None,
            cycles_completed: 0,
            positions: Vec::new(),
            updated_at: Utc::now(),
            last_error: None,
        }
    }

    pub fn with_state(mut self, state: StrategyState) -> Self {
        self.state = state;
        self
    }

    pub fn with_uptime(mut self, uptime: Duration) -> Self {
        self.uptime = Some(uptime);
        self
    }

    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = Some(phase.into());
        self
    }

    pub fn with_cycles(mut self, cycles: u64) -> Self {
        self.cycles_completed = cycles;
        self
    }

    pub fn with_positions(mut self, positions: Vec<StrategyPosition>) -> Self {
        self.positions = positions;
        self
    }

    pub fn with_last_error(mut self, last_error: impl Into<String>) -> Self {
        self.last_error = Some(last_error.into());
        self
    }
}
