//! 舵机总线句柄（对外 API）

use crate::command::BusRequest;
use crate::dispatch::Dispatcher;
use crate::error::BusError;
use crate::metrics::{BusMetrics, MetricsSnapshot};
use crate::servo::{Servo, ServoTable};
use crossbeam_channel::{RecvTimeoutError, SendTimeoutError, Sender};
use puppet_protocol::{Frame, FrameCodec, ProtocolVariant, ServoId, ServoModel};
use puppet_serial::SerialAdapter;
use std::sync::Arc;
use std::thread::{JoinHandle, spawn};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// 分发队列容量
///
/// 队列满时调用方阻塞等待（背压），不丢弃请求。
pub const QUEUE_CAPACITY: usize = 64;

/// 默认应答超时
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_millis(100);

/// 默认阻塞写等待上限
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Drop 时等待分发线程退出的上限
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// 带超时的线程 join
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        use std::sync::mpsc;

        let (tx, rx) = mpsc::channel();

        // 看门狗线程负责真正的 join
        spawn(move || {
            let result = self.join();
            let _ = tx.send(result);
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// 舵机总线
///
/// 唯一拥有串口的对象。所有操作都转换成请求送入同一个 FIFO 队列，
/// 由分发线程按顺序执行，因此姿态插值与嘴部驱动可以同时持有 `Arc<MotorBus>`
/// 而不会在半双工总线上交错写入。
///
/// 串口打开失败时总线处于**不可用**状态：所有操作立即返回 [`BusError::Unavailable`]，
/// 既不阻塞也不 panic。
pub struct MotorBus {
    /// 请求发送端；`None` 表示总线不可用
    ///
    /// Drop 时必须先关闭通道再 join 分发线程，否则分发线程收不到 `Disconnected`。
    tx: Option<Sender<BusRequest>>,
    dispatch_thread: Option<JoinHandle<()>>,
    variant: ProtocolVariant,
    servos: ServoTable,
    reply_timeout: Duration,
    write_timeout: Duration,
    metrics: Arc<BusMetrics>,
    port: String,
}

impl MotorBus {
    /// 打开串口并启动分发线程
    ///
    /// 等价于 `MotorBusBuilder::new().port(port).baud_rate(baud_rate).build()`。
    ///
    /// # 错误
    /// - `ConnectError`: 设备不存在、权限不足等
    pub fn connect(port: &str, baud_rate: u32) -> Result<Self, crate::ConnectError> {
        crate::MotorBusBuilder::new().port(port).baud_rate(baud_rate).build()
    }

    /// 在已打开的适配器上启动分发线程（内部方法，由 Builder 调用）
    pub(crate) fn start(
        adapter: impl SerialAdapter + Send + 'static,
        codec: FrameCodec,
        echo: bool,
        variant: ProtocolVariant,
        servos: ServoTable,
        reply_timeout: Duration,
        write_timeout: Duration,
    ) -> Self {
        let port = adapter.describe();
        let (tx, rx) = crossbeam_channel::bounded(QUEUE_CAPACITY);
        let metrics = Arc::new(BusMetrics::new());
        let metrics_clone = metrics.clone();

        let dispatcher = Dispatcher::new(adapter, codec, echo, metrics_clone);
        let dispatch_thread = spawn(move || dispatcher.run(rx));

        info!(
            "Motor bus started on {} ({} protocol, {} servos)",
            port,
            variant,
            servos.len()
        );

        Self {
            tx: Some(tx),
            dispatch_thread: Some(dispatch_thread),
            variant,
            servos,
            reply_timeout,
            write_timeout,
            metrics,
            port,
        }
    }

    /// 创建不可用（降级）的总线
    pub fn unavailable(port: &str, variant: ProtocolVariant, servos: ServoTable) -> Self {
        Self {
            tx: None,
            dispatch_thread: None,
            variant,
            servos,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            metrics: Arc::new(BusMetrics::new()),
            port: port.to_string(),
        }
    }

    /// 总线是否可用
    pub fn is_available(&self) -> bool {
        self.tx.is_some()
    }

    /// 协议变体
    pub fn variant(&self) -> ProtocolVariant {
        self.variant
    }

    /// 端口描述
    pub fn port(&self) -> &str {
        &self.port
    }

    /// 舵机表
    pub fn servos(&self) -> &ServoTable {
        &self.servos
    }

    /// 按名称查找舵机
    ///
    /// # 错误
    /// - `BusError::UnknownServo`: 舵机表中没有该名称
    pub fn servo_by_name(&self, name: &str) -> Result<&Servo, BusError> {
        self.servos
            .by_name(name)
            .ok_or_else(|| BusError::UnknownServo(name.to_string()))
    }

    /// 默认应答超时
    pub fn reply_timeout(&self) -> Duration {
        self.reply_timeout
    }

    /// 阻塞写等待上限
    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    /// 获取性能指标快照
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// 将请求位置钳位到舵机的安全范围
    ///
    /// 不在舵机表中的地址按总线变体对应的默认型号范围钳位。
    pub fn clamp(&self, id: ServoId, requested: i32) -> u16 {
        match self.servos.get(id) {
            Some(servo) => servo.clamp(requested),
            None => {
                let fallback = Servo::new(id, id.to_string(), self.default_model());
                fallback.clamp(requested)
            },
        }
    }

    fn default_model(&self) -> ServoModel {
        match self.variant {
            ProtocolVariant::Feetech => ServoModel::Sts3215,
            ProtocolVariant::LxBus => ServoModel::Lx16a,
        }
    }

    fn sender(&self) -> Result<&Sender<BusRequest>, BusError> {
        self.tx.as_ref().ok_or(BusError::Unavailable)
    }

    fn submit(&self, request: BusRequest) -> Result<(), BusError> {
        self.sender()?
            .send(request)
            .map_err(|_| BusError::ChannelClosed)
    }

    /// 写出帧并等待应答
    ///
    /// `timeout` 从调用时刻算起，包括在队列中排队的时间；
    /// 到期时直接返回，过期的请求不会再写到总线上。
    /// 应答损坏时返回 `BusError::Protocol`，不自动重试。
    ///
    /// # 错误
    /// - `BusError::Unavailable`: 总线不可用
    /// - `BusError::Timeout`: 超时内没有应答
    /// - `BusError::Protocol`: 应答校验和或帧结构错误
    /// - `BusError::Serial`: 串口读写失败
    pub fn send_and_await(&self, frame: Frame, timeout: Duration) -> Result<Frame, BusError> {
        let address = frame.address();
        let deadline = Instant::now() + timeout;
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        let request = BusRequest::Exchange {
            frame,
            deadline,
            timeout,
            reply: reply_tx,
        };

        let expired = BusError::Timeout { address, timeout };
        match self
            .sender()?
            .send_timeout(request, deadline.saturating_duration_since(Instant::now()))
        {
            Ok(()) => {},
            Err(SendTimeoutError::Timeout(_)) => return Err(expired),
            Err(SendTimeoutError::Disconnected(_)) => return Err(BusError::ChannelClosed),
        }

        match reply_rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(expired),
            Err(RecvTimeoutError::Disconnected) => Err(BusError::ChannelClosed),
        }
    }

    /// 写目标位置（即发即忘）
    ///
    /// 位置先钳位到舵机安全范围；写位置指令没有应答帧，因此不等待。
    /// 串口写出失败只记录日志与指标，调用方看不到。
    ///
    /// 返回实际下发的（钳位后的）位置。
    pub fn write_position(
        &self,
        id: ServoId,
        position: i32,
        duration_ms: u16,
    ) -> Result<u16, BusError> {
        let clamped = self.clamp(id, position);
        let frame = self.variant.write_position_frame(id, clamped, duration_ms);
        self.submit(BusRequest::Write { frame, ack: None })?;
        Ok(clamped)
    }

    /// 写目标位置并等待写出完成
    ///
    /// 与 [`write_position`](Self::write_position) 相同，但会等待分发线程真正写出，
    /// 串口错误返回给调用方。用于动作序列的最后一步。
    ///
    /// 最多等待写超时（默认 1s）；超时返回 `BusError::Timeout`，
    /// 已排队的写入仍会执行（归位指令不能丢）。
    pub fn write_position_blocking(
        &self,
        id: ServoId,
        position: i32,
        duration_ms: u16,
    ) -> Result<u16, BusError> {
        let clamped = self.clamp(id, position);
        let frame = self.variant.write_position_frame(id, clamped, duration_ms);
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        self.submit(BusRequest::Write {
            frame,
            ack: Some(ack_tx),
        })?;
        match ack_rx.recv_timeout(self.write_timeout) {
            Ok(result) => result?,
            Err(RecvTimeoutError::Timeout) => {
                return Err(BusError::Timeout {
                    address: id.get(),
                    timeout: self.write_timeout,
                });
            },
            Err(RecvTimeoutError::Disconnected) => return Err(BusError::ChannelClosed),
        }
        Ok(clamped)
    }

    /// 读取当前位置
    pub fn read_position(&self, id: ServoId) -> Result<u16, BusError> {
        let reply = self.send_and_await(self.variant.read_position_frame(id), self.reply_timeout)?;
        let parsed = self.variant.parse_position_reply(id, &reply)?;
        if parsed.status != 0 {
            warn!("{} reported status 0x{:02X}", id, parsed.status);
        }
        Ok(parsed.position)
    }

    /// 存活探测
    pub fn ping(&self, id: ServoId) -> Result<(), BusError> {
        self.send_and_await(self.variant.ping_frame(id), self.reply_timeout)?;
        Ok(())
    }

    /// 等待队列中此前的请求全部处理完
    ///
    /// # 错误
    /// - `BusError::FlushTimeout`: 超时内队列未排空
    pub fn flush(&self, timeout: Duration) -> Result<(), BusError> {
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        self.submit(BusRequest::Flush { done: done_tx })?;
        match done_rx.recv_timeout(timeout) {
            Ok(()) => Ok(()),
            Err(RecvTimeoutError::Timeout) => Err(BusError::FlushTimeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(BusError::ChannelClosed),
        }
    }
}

impl std::fmt::Debug for MotorBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotorBus")
            .field("port", &self.port)
            .field("variant", &self.variant)
            .field("available", &self.is_available())
            .field("servos", &self.servos.len())
            .finish()
    }
}

impl Drop for MotorBus {
    fn drop(&mut self) {
        // 先关闭请求通道，分发线程处理完剩余请求后退出
        drop(self.tx.take());

        if let Some(handle) = self.dispatch_thread.take()
            && let Err(_e) = handle.join_timeout(JOIN_TIMEOUT)
        {
            error!(
                "Dispatch thread panicked or failed to shut down within {:?}",
                JOIN_TIMEOUT
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MotorBusBuilder;
    use puppet_serial::MockSerialAdapter;

    fn id(n: u8) -> ServoId {
        ServoId::new(n).unwrap()
    }

    #[test]
    fn test_unavailable_bus() {
        let bus = MotorBus::unavailable("/dev/null", ProtocolVariant::Feetech, ServoTable::new());
        assert!(!bus.is_available());
        assert!(matches!(bus.read_position(id(1)), Err(BusError::Unavailable)));
        assert!(matches!(
            bus.write_position(id(1), 100, 0),
            Err(BusError::Unavailable)
        ));
        assert!(matches!(
            bus.flush(Duration::from_millis(10)),
            Err(BusError::Unavailable)
        ));
        assert!(matches!(bus.ping(id(1)), Err(BusError::Unavailable)));
    }

    #[test]
    fn test_clamp_fallback_for_unknown_servo() {
        let bus = MotorBus::unavailable("x", ProtocolVariant::LxBus, ServoTable::new());
        assert_eq!(bus.clamp(id(9), 5000), 1000);
        assert_eq!(bus.clamp(id(9), -1), 0);
    }

    #[test]
    fn test_drop_joins_dispatch_thread() {
        let adapter = MockSerialAdapter::new(ProtocolVariant::Feetech);
        let handle = adapter.handle();
        handle.set_position(1, 0);
        let bus = MotorBusBuilder::new().build_with_adapter(adapter);
        for p in 0..10 {
            bus.write_position(id(1), p * 10, 0).unwrap();
        }
        drop(bus);
        // 关闭前排队的写入全部执行
        assert_eq!(handle.written_positions(1).len(), 10);
        assert_eq!(handle.position(1), Some(90));
    }
}
