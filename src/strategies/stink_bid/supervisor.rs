//! 轮次主循环
//!
//! 预热 → [撤残单 → 平残仓 → 等待 → 派发任务 → 挂单窗口 → 取消任务 → 等待] → 下一轮
//!
//! 取消是单向通知，主循环不等待任务退出；靠结算等待和下一轮守卫兜底。

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::core::error::ExecutionError;
use crate::core::types::OrderSide;

use super::config::{LevelParams, TimingConfig};
use super::guards::{FlattenAction, OrderGuard, PositionGuard};
use super::quoter::LevelQuoter;
use super::worker::{LevelWorker, WorkerHandle};

/// 主循环阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SupervisorPhase {
    Idle,
    Warmup,
    GuardCheck,
    Spawning,
    Active,
    Cancelling,
    Settling,
    Stopped,
    Failed,
}

/// 单轮执行汇总
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    /// 挂单守卫看到的残留挂单数（未触发为 None）
    pub cancelled_orders: Option<usize>,
    pub flatten: Option<FlattenAction>,
    /// 按派发顺序排列的任务
    pub workers: Vec<String>,
    pub workers_signalled: usize,
    /// 结算等待结束时已退出的任务数
    pub workers_finished: usize,
    /// 收到停止请求而提前结束
    pub interrupted: bool,
}

/// 对外发布的主循环进度
#[derive(Debug, Clone, Serialize)]
pub struct SupervisorProgress {
    pub phase: SupervisorPhase,
    pub cycles_completed: u64,
    pub last_report: Option<CycleReport>,
}

impl Default for SupervisorProgress {
    fn default() -> Self {
        Self {
            phase: SupervisorPhase::Idle,
            cycles_completed: 0,
            last_report: None,
        }
    }
}

pub struct CycleSupervisor {
    symbol: String,
    levels: Vec<LevelParams>,
    timing: TimingConfig,
    poll_interval: Duration,
    order_guard: OrderGuard,
    position_guard: PositionGuard,
    quoter: Arc<dyn LevelQuoter>,
    progress: watch::Sender<SupervisorProgress>,
    shutdown: watch::Receiver<bool>,
    cycles_completed: u64,
}

impl CycleSupervisor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: impl Into<String>,
        levels: Vec<LevelParams>,
        timing: TimingConfig,
        poll_interval: Duration,
        order_guard: OrderGuard,
        position_guard: PositionGuard,
        quoter: Arc<dyn LevelQuoter>,
        progress: watch::Sender<SupervisorProgress>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            levels,
            timing,
            poll_interval,
            order_guard,
            position_guard,
            quoter,
            progress,
            shutdown,
            cycles_completed: 0,
        }
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed
    }

    /// 预热一次后无限循环，直到收到停止请求；守卫失败时返回错误，不再派发任务
    pub async fn run(&mut self) -> Result<u64, ExecutionError> {
        self.set_phase(SupervisorPhase::Warmup);
        log::info!(
            "[stink_bid] ⏳ {} 等待行情/账户数据预热（{:?}）...",
            self.symbol,
            self.timing.warmup_delay()
        );
        if !self.pause(self.timing.warmup_delay()).await {
            self.set_phase(SupervisorPhase::Stopped);
            return Ok(self.cycles_completed);
        }

        log::info!(
            "[stink_bid] 🚀 {} 启动做市循环，{} 个层级共 {} 个任务",
            self.symbol,
            self.levels.len(),
            self.levels.len() * 2
        );

        loop {
            if self.is_shutdown() {
                break;
            }
            match self.run_cycle().await {
                Ok(report) => {
                    if report.interrupted {
                        break;
                    }
                }
                Err(e) => {
                    self.set_phase(SupervisorPhase::Failed);
                    log::error!(
                        "[stink_bid] ❌ {} 第 {} 轮守卫失败，停止做市循环: {}",
                        self.symbol,
                        self.cycles_completed + 1,
                        e
                    );
                    return Err(e);
                }
            }
        }

        self.set_phase(SupervisorPhase::Stopped);
        log::info!(
            "[stink_bid] 🛑 {} 做市循环已停止，共完成 {} 轮",
            self.symbol,
            self.cycles_completed
        );
        Ok(self.cycles_completed)
    }

    /// 执行一轮：守卫检查 → 派发 → 挂单窗口 → 取消 → 结算
    pub async fn run_cycle(&mut self) -> Result<CycleReport, ExecutionError> {
        let mut report = CycleReport {
            cycle: self.cycles_completed + 1,
            ..CycleReport::default()
        };

        // 先撤单再平仓：挂单可能在平仓决策期间成交
        self.set_phase(SupervisorPhase::GuardCheck);
        report.cancelled_orders = self.order_guard.cancel_all_if_needed().await?;
        report.flatten = self.position_guard.flatten_if_needed().await?;

        if !self.pause(self.timing.guard_settle_delay()).await {
            report.interrupted = true;
            self.finish_cycle(&report);
            return Ok(report);
        }

        self.set_phase(SupervisorPhase::Spawning);
        let handles = self.spawn_workers();
        report.workers = handles.iter().map(|h| h.id().to_string()).collect();
        log::info!(
            "[stink_bid] 🔄 第 {} 轮开始，派发 {} 个任务，窗口 {:?}",
            report.cycle,
            handles.len(),
            self.timing.cycle_window()
        );

        self.set_phase(SupervisorPhase::Active);
        if !self.pause(self.timing.cycle_window()).await {
            report.interrupted = true;
        }

        self.set_phase(SupervisorPhase::Cancelling);
        for handle in &handles {
            handle.cancel();
        }
        report.workers_signalled = handles.iter().filter(|h| h.is_cancel_requested()).count();

        // 结算等待不可中断：停机后的全撤依赖它
        self.set_phase(SupervisorPhase::Settling);
        tokio::time::sleep(self.timing.settle_delay()).await;

        report.workers_finished = handles.iter().filter(|h| h.is_finished()).count();
        if report.workers_finished < handles.len() {
            log::warn!(
                "[stink_bid] 第 {} 轮结算后仍有 {} 个任务未退出",
                report.cycle,
                handles.len() - report.workers_finished
            );
        }
        drop(handles);

        self.cycles_completed = report.cycle;
        log::info!(
            "[stink_bid] ✅ 第 {} 轮结束 | 已取消 {} 个任务 | 已退出 {}",
            report.cycle,
            report.workers_signalled,
            report.workers_finished
        );
        if let Ok(json) = serde_json::to_string(&report) {
            log::debug!("[stink_bid] cycle_report {}", json);
        }
        self.finish_cycle(&report);
        Ok(report)
    }

    /// 每个层级先买后卖，各派发一个独立可取消的任务
    fn spawn_workers(&self) -> Vec<WorkerHandle> {
        let mut handles = Vec::with_capacity(self.levels.len() * 2);
        for level in &self.levels {
            for side in [OrderSide::Buy, OrderSide::Sell] {
                let worker = LevelWorker::new(
                    level.clone(),
                    side,
                    self.quoter.clone(),
                    self.poll_interval,
                );
                handles.push(worker.spawn());
            }
        }
        handles
    }

    fn set_phase(&self, phase: SupervisorPhase) {
        self.progress.send_modify(|p| p.phase = phase);
    }

    fn finish_cycle(&self, report: &CycleReport) {
        let cycles = self.cycles_completed;
        let report = report.clone();
        self.progress.send_modify(|p| {
            p.cycles_completed = cycles;
            p.last_report = Some(report);
        });
    }

    fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// 等待指定时间；期间收到停止请求返回 false
    async fn pause(&mut self, duration: Duration) -> bool {
        // 超出 Instant 表示范围的时长由 sleep 截断为极远期限
        let sleep = match Instant::now().checked_add(duration) {
            Some(deadline) => tokio::time::sleep_until(deadline),
            None => tokio::time::sleep(duration),
        };
        tokio::pin!(sleep);

        loop {
            if self.is_shutdown() {
                return false;
            }
            tokio::select! {
                _ = &mut sleep => return true,
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        // 停止通道已关闭，只能等满
                        (&mut sleep).await;
                        return !self.is_shutdown();
                    }
                }
            }
        }
    }
}
