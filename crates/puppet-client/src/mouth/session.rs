//! 嘴部驱动会话
//!
//! 音频播放线程把音频块送进会话（[`ArticulationSession::feed`] 从不阻塞），
//! 独立的工作线程按到达顺序逐块、逐窗口地计算开合度并写总线。
//! 写总线的等待因此不会拖慢音频播放或下一块的投递。
//!
//! # 收尾保证
//!
//! 工作线程入口处持有 [`MouthGuard`]：无论正常结束（[`finish`](ArticulationSession::finish)）、
//! 取消（[`cancel`](ArticulationSession::cancel) / [`CancelHandle`] / Drop）还是 panic，
//! 最后一条位置指令都是静止位置。

use super::guard::MouthGuard;
use super::{ArticulationEngine, MouthSnapshot};
use crate::error::ArticulationError;
use crate::pacer::Pacer;
use arc_swap::ArcSwap;
use crossbeam_channel::{Receiver, Sender};
use puppet_driver::MotorBus;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 音频块：有符号 16 位单声道样本
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub samples: Vec<i16>,
    /// 块起点在音频流中的时间
    pub timestamp: Duration,
}

impl AudioChunk {
    pub fn new(samples: Vec<i16>, timestamp: Duration) -> Self {
        Self { samples, timestamp }
    }
}

/// 取消句柄（可跨线程克隆，例如交给 Ctrl-C 处理函数）
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// 请求取消：工作线程在下一个窗口前停止，然后执行收尾
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// 嘴部驱动会话
pub struct ArticulationSession {
    /// 音频块发送端；`None` 表示已停止接收
    tx: Option<Sender<AudioChunk>>,
    worker: Option<JoinHandle<()>>,
    cancel: CancelHandle,
    snapshot: Arc<ArcSwap<MouthSnapshot>>,
}

impl ArticulationSession {
    /// 启动工作线程
    pub fn start(bus: Arc<MotorBus>, engine: ArticulationEngine) -> Result<Self, ArticulationError> {
        // 无界队列：不丢块、不重排
        let (tx, rx) = crossbeam_channel::unbounded();
        let cancel = CancelHandle::default();
        let snapshot = Arc::new(ArcSwap::from_pointee(MouthSnapshot::default()));

        let worker = {
            let cancel = cancel.clone();
            let snapshot = snapshot.clone();
            std::thread::Builder::new()
                .name("puppet-mouth".into())
                .spawn(move || worker_loop(bus, engine, rx, cancel, snapshot))
                .map_err(ArticulationError::Spawn)?
        };

        debug!("Articulation session started");
        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
            cancel,
            snapshot,
        })
    }

    /// 投递一个音频块（不阻塞）
    ///
    /// # 错误
    /// - `ArticulationError::SessionClosed`: 会话已取消或工作线程已退出
    pub fn feed(&self, chunk: AudioChunk) -> Result<(), ArticulationError> {
        if self.cancel.is_cancelled() {
            return Err(ArticulationError::SessionClosed);
        }
        let tx = self.tx.as_ref().ok_or(ArticulationError::SessionClosed)?;
        tx.send(chunk).map_err(|_| ArticulationError::SessionClosed)
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// 尚未处理的音频块数
    pub fn pending(&self) -> usize {
        self.tx.as_ref().map_or(0, Sender::len)
    }

    /// 诊断快照
    pub fn snapshot(&self) -> MouthSnapshot {
        **self.snapshot.load()
    }

    /// 处理完所有已投递的音频块后收尾
    pub fn finish(mut self) -> Result<MouthSnapshot, ArticulationError> {
        self.shutdown()?;
        Ok(self.snapshot())
    }

    /// 在下一个窗口前停止并收尾，丢弃未处理的音频块
    pub fn cancel(mut self) -> Result<MouthSnapshot, ArticulationError> {
        self.cancel.cancel();
        self.shutdown()?;
        Ok(self.snapshot())
    }

    fn shutdown(&mut self) -> Result<(), ArticulationError> {
        // 先关闭通道，工作线程才能退出接收循环
        drop(self.tx.take());
        match self.worker.take() {
            Some(worker) => worker.join().map_err(|_| ArticulationError::WorkerPanicked),
            None => Ok(()),
        }
    }
}

impl Drop for ArticulationSession {
    fn drop(&mut self) {
        if self.worker.is_none() {
            return;
        }
        self.cancel.cancel();
        if let Err(e) = self.shutdown() {
            error!("Failed to stop articulation worker: {}", e);
        }
    }
}

impl std::fmt::Debug for ArticulationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArticulationSession")
            .field("pending", &self.pending())
            .field("cancelled", &self.cancel.is_cancelled())
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

fn worker_loop(
    bus: Arc<MotorBus>,
    engine: ArticulationEngine,
    rx: Receiver<AudioChunk>,
    cancel: CancelHandle,
    snapshot: Arc<ArcSwap<MouthSnapshot>>,
) {
    let _guard = MouthGuard::new(&bus, engine.servo_id(), engine.resting_position());
    let mut state = MouthSnapshot::default();

    for chunk in rx.iter() {
        if cancel.is_cancelled() {
            break;
        }
        articulate_chunk(&bus, &engine, &chunk, &cancel, &mut state, &snapshot);
        state.chunks_processed += 1;
        snapshot.store(Arc::new(state));
    }

    info!(
        "Articulation finished: {} chunks, {} windows{}",
        state.chunks_processed,
        state.windows_processed,
        if cancel.is_cancelled() { " (cancelled)" } else { "" }
    );
}

/// 逐窗口驱动一个音频块，结束时回到静止位置
///
/// 写入失败只记录日志，继续下一个窗口。
fn articulate_chunk(
    bus: &MotorBus,
    engine: &ArticulationEngine,
    chunk: &AudioChunk,
    cancel: &CancelHandle,
    state: &mut MouthSnapshot,
    snapshot: &ArcSwap<MouthSnapshot>,
) {
    let servo = engine.servo_id();
    let plan = engine.plan(&chunk.samples);
    let mut pacer = Pacer::new(engine.update_delay());

    for (index, step) in plan.iter().enumerate() {
        if cancel.is_cancelled() {
            return;
        }
        let position = match bus.write_position(servo, step.position, 0) {
            Ok(position) => position,
            Err(e) => {
                warn!("Mouth window {} at {:?} dropped: {}", index, chunk.timestamp, e);
                bus.clamp(servo, step.position)
            },
        };
        debug!(
            "Window {}/{} at {:?}: amplitude {:.4}, openness {:.2}, position {}",
            index + 1,
            plan.len(),
            chunk.timestamp,
            step.amplitude,
            step.openness,
            position
        );

        state.amplitude = step.amplitude;
        state.openness = step.openness;
        state.position = position;
        state.windows_processed += 1;
        snapshot.store(Arc::new(*state));

        pacer.wait_ticks(step.hold);
    }

    let resting = engine.resting_position();
    let position = match bus.write_position(servo, resting, 0) {
        Ok(position) => position,
        Err(e) => {
            warn!("Failed to rest mouth after chunk: {}", e);
            bus.clamp(servo, resting)
        },
    };
    state.openness = engine.config().resting_openness;
    state.position = position;
}
