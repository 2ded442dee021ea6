//! 驱动层错误类型定义

use puppet_protocol::ProtocolError;
use puppet_serial::SerialError;
use std::time::Duration;
use thiserror::Error;

/// 打开串口失败
///
/// 总线随之进入不可用状态（见 [`MotorBusBuilder::build_or_degrade`](crate::MotorBusBuilder::build_or_degrade)）。
#[derive(Error, Debug)]
#[error("Failed to open motor bus on {port}: {source}")]
pub struct ConnectError {
    pub port: String,
    #[source]
    pub source: SerialError,
}

/// 总线操作错误类型
#[derive(Error, Debug)]
pub enum BusError {
    /// 串口未能打开，总线处于降级（no-op）状态
    #[error("Motor bus unavailable")]
    Unavailable,

    /// 在超时时间内没有收到应答
    #[error("No reply from 0x{address:02X} within {timeout:?}")]
    Timeout { address: u8, timeout: Duration },

    /// 应答损坏或格式不符（不自动重试）
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 串口读写错误
    #[error("Serial error: {0}")]
    Serial(#[from] SerialError),

    /// 分发通道已关闭（分发线程退出）
    #[error("Command channel closed")]
    ChannelClosed,

    /// 等待队列排空超时
    #[error("Flush timeout after {0:?}")]
    FlushTimeout(Duration),

    /// 舵机表中没有该名称
    #[error("Unknown servo: {0}")]
    UnknownServo(String),
}

impl BusError {
    /// 是否为应答损坏（校验和或帧结构错误）
    pub fn is_corruption(&self) -> bool {
        matches!(self, BusError::Protocol(e) if e.is_corruption())
    }

    /// 是否为应答超时
    pub fn is_timeout(&self) -> bool {
        matches!(self, BusError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use puppet_protocol::FramingError;

    #[test]
    fn test_bus_error_display() {
        let err = BusError::Timeout {
            address: 6,
            timeout: Duration::from_millis(100),
        };
        assert_eq!(err.to_string(), "No reply from 0x06 within 100ms");

        assert_eq!(BusError::Unavailable.to_string(), "Motor bus unavailable");
        assert_eq!(BusError::ChannelClosed.to_string(), "Command channel closed");

        let err = BusError::UnknownServo("jaw".to_string());
        assert!(err.to_string().contains("jaw"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: BusError = ProtocolError::Checksum {
            expected: 1,
            actual: 2,
        }
        .into();
        assert!(err.is_corruption());
        assert!(!err.is_timeout());

        let err: BusError = ProtocolError::from(FramingError::InvalidLength(0)).into();
        assert!(err.is_corruption());

        let err: BusError = ProtocolError::InvalidServoId(0).into();
        assert!(!err.is_corruption());
    }

    #[test]
    fn test_connect_error_source() {
        use std::error::Error;
        let err = ConnectError {
            port: "/dev/ttyACM0".to_string(),
            source: SerialError::Closed,
        };
        assert!(err.to_string().contains("/dev/ttyACM0"));
        assert!(err.source().is_some());
    }
}
