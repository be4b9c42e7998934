use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core::types::OrderSide;

use super::config::LevelParams;
use super::quoter::{LevelQuoter, LevelSlot, QuoteOutcome};

/// 任务标识：层级名 + 方向
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerId {
    pub level: String,
    pub side: OrderSide,
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.level, self.side)
    }
}

/// 任务退出时的汇总
#[derive(Debug, Clone)]
pub struct WorkerExit {
    pub id: WorkerId,
    pub quote_checks: u32,
    pub orders_placed: u32,
    pub faults: u32,
    /// 退出时仍挂着的订单（留给下一轮挂单守卫清理）
    pub live_order: Option<String>,
}

/// 主循环持有的任务句柄：取消信号 + 完成信号
pub struct WorkerHandle {
    id: WorkerId,
    cancel: watch::Sender<bool>,
    task: JoinHandle<WorkerExit>,
}

impl WorkerHandle {
    pub fn id(&self) -> &WorkerId {
        &self.id
    }

    /// 发出取消请求，不等待任务退出
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_cancel_requested(&self) -> bool {
        *self.cancel.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// 等待任务结束（只用于停机和测试，主循环内不调用）
    pub async fn join(self) -> Option<WorkerExit> {
        match self.task.await {
            Ok(exit) => Some(exit),
            Err(e) => {
                log::warn!("[worker {}] 任务异常结束: {}", self.id, e);
                None
            }
        }
    }
}

/// 单个 (层级, 方向) 做市任务
///
/// 每次检查前先看取消标志；已发出的下单请求不会被中断，
/// 可能在取消之后才完成。退出时不撤自己的挂单。
pub struct LevelWorker {
    id: WorkerId,
    level: LevelParams,
    quoter: Arc<dyn LevelQuoter>,
    poll_interval: Duration,
}

impl LevelWorker {
    pub fn new(
        level: LevelParams,
        side: OrderSide,
        quoter: Arc<dyn LevelQuoter>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            id: WorkerId {
                level: level.name.clone(),
                side,
            },
            level,
            quoter,
            poll_interval,
        }
    }

    pub fn spawn(self) -> WorkerHandle {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let id = self.id.clone();
        let task = tokio::spawn(self.run(cancel_rx));
        WorkerHandle {
            id,
            cancel: cancel_tx,
            task,
        }
    }

    async fn run(self, mut cancel: watch::Receiver<bool>) -> WorkerExit {
        let mut slot = LevelSlot::default();
        let mut quote_checks = 0u32;
        let mut faults = 0u32;

        loop {
            if *cancel.borrow() {
                break;
            }

            quote_checks += 1;
            match self.quoter.quote(&self.level, self.id.side, &mut slot).await {
                Ok(QuoteOutcome::Placed { order_id, price }) => {
                    log::info!("[worker {}] 📌 挂单 {} @ {}", self.id, order_id, price);
                }
                Ok(QuoteOutcome::Repriced { order_id, price }) => {
                    log::info!("[worker {}] 🔁 重挂 {} @ {}", self.id, order_id, price);
                }
                Ok(QuoteOutcome::Filled { order_id }) => {
                    log::info!("[worker {}] 💰 挂单成交 {}，本轮停止挂单", self.id, order_id);
                }
                Ok(QuoteOutcome::Holding) | Ok(QuoteOutcome::Idle) => {}
                Err(fault) => {
                    faults += 1;
                    log::warn!("[worker {}] ⚠️ 报价异常: {}", self.id, fault);
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = cancel.changed() => {
                    // 句柄被丢弃等同于取消
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        log::debug!(
            "[worker {}] 已退出 | 检查 {} 次 | 下单 {} 次 | 异常 {} 次",
            self.id,
            quote_checks,
            slot.placed,
            faults
        );

        WorkerExit {
            id: self.id,
            quote_checks,
            orders_placed: slot.placed,
            faults,
            live_order: slot.live.map(|l| l.order_id),
        }
    }
}
