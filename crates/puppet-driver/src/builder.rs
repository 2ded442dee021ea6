//! Builder 模式实现
//!
//! 提供链式构造 `MotorBus` 实例的便捷方式。

use crate::bus::{DEFAULT_REPLY_TIMEOUT, DEFAULT_WRITE_TIMEOUT, MotorBus};
use crate::error::ConnectError;
use crate::servo::{Servo, ServoTable};
use puppet_protocol::{ChecksumPolicy, FrameCodec, ProtocolVariant};
use puppet_serial::{SerialAdapter, SerialPortAdapter};
use std::time::Duration;
use tracing::warn;

/// 默认串口
pub const DEFAULT_PORT: &str = "/dev/ttyACM0";

/// 默认波特率（Feetech STS 出厂设置）
pub const DEFAULT_BAUD_RATE: u32 = 1_000_000;

/// MotorBus Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use puppet_driver::{MotorBusBuilder, Servo};
/// use puppet_protocol::{ProtocolVariant, ServoId, ServoModel};
///
/// let jaw = Servo::new(ServoId::new(6).unwrap(), "servo6", ServoModel::Sts3215)
///     .with_range(1100, 2100);
///
/// let bus = MotorBusBuilder::new()
///     .port("/dev/ttyACM0")
///     .baud_rate(1_000_000)
///     .variant(ProtocolVariant::Feetech)
///     .servo(jaw)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct MotorBusBuilder {
    port: Option<String>,
    baud_rate: Option<u32>,
    variant: ProtocolVariant,
    /// 覆盖变体的默认校验策略
    checksum: Option<ChecksumPolicy>,
    reply_timeout: Duration,
    write_timeout: Duration,
    echo: bool,
    servos: ServoTable,
}

impl MotorBusBuilder {
    pub fn new() -> Self {
        Self {
            port: None,
            baud_rate: None,
            variant: ProtocolVariant::default(),
            checksum: None,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            echo: false,
            servos: ServoTable::new(),
        }
    }

    /// 设置串口路径（默认 `/dev/ttyACM0`）
    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    /// 设置波特率（默认 1 000 000）
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = Some(baud_rate);
        self
    }

    /// 选择协议变体
    pub fn variant(mut self, variant: ProtocolVariant) -> Self {
        self.variant = variant;
        self
    }

    /// 覆盖校验策略（兼容非标准固件）
    pub fn checksum(mut self, checksum: ChecksumPolicy) -> Self {
        self.checksum = Some(checksum);
        self
    }

    /// 设置应答超时（默认 100ms）
    pub fn reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// 设置阻塞写等待上限（默认 1s）
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// 适配器是否回显写出的字节（默认否）
    ///
    /// TX/RX 短接的单线接法会把请求原样读回；开启后每次交换丢弃写出后的第一帧回显。
    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// 添加一个舵机
    pub fn servo(mut self, servo: Servo) -> Self {
        self.servos.insert(servo);
        self
    }

    /// 添加多个舵机
    pub fn servos(mut self, servos: impl IntoIterator<Item = Servo>) -> Self {
        for servo in servos {
            self.servos.insert(servo);
        }
        self
    }

    fn port_or_default(&self) -> String {
        self.port.clone().unwrap_or_else(|| DEFAULT_PORT.to_string())
    }

    fn codec(&self) -> FrameCodec {
        let codec = self.variant.codec();
        match self.checksum {
            Some(policy) => codec.with_checksum(policy),
            None => codec,
        }
    }

    /// 打开串口并启动总线
    ///
    /// # 错误
    /// - `ConnectError`: 串口打开失败
    pub fn build(self) -> Result<MotorBus, ConnectError> {
        let port = self.port_or_default();
        let baud_rate = self.baud_rate.unwrap_or(DEFAULT_BAUD_RATE);

        let adapter = SerialPortAdapter::open(&port, baud_rate)
            .map_err(|source| ConnectError { port, source })?;
        Ok(self.build_with_adapter(adapter))
    }

    /// 打开串口；失败时记录日志并返回不可用的总线
    ///
    /// 不可用的总线上所有操作返回 `BusError::Unavailable`，
    /// 使上层会话在没有硬件时也能继续运行。
    pub fn build_or_degrade(self) -> MotorBus {
        let variant = self.variant;
        let servos = self.servos.clone();
        let port = self.port_or_default();

        match self.build() {
            Ok(bus) => bus,
            Err(e) => {
                warn!("{}; motor bus degraded to no-op", e);
                MotorBus::unavailable(&port, variant, servos)
            },
        }
    }

    /// 使用给定适配器启动总线（Mock、测试或自定义传输）
    pub fn build_with_adapter(self, adapter: impl SerialAdapter + Send + 'static) -> MotorBus {
        let codec = self.codec();
        MotorBus::start(
            adapter,
            codec,
            self.echo,
            self.variant,
            self.servos,
            self.reply_timeout,
            self.write_timeout,
        )
    }
}

impl Default for MotorBusBuilder {
    fn default() -> Self {
        Self::new()
    }
}
