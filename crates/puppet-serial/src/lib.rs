//! # Puppet Serial Adapter Layer
//!
//! 串口硬件抽象层：驱动层只依赖 [`SerialAdapter`] trait，
//! 真实硬件使用 [`SerialPortAdapter`]，测试与无硬件调试使用 `MockSerialAdapter`（`mock` feature）。

use std::time::Duration;
use thiserror::Error;

pub mod port;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use port::SerialPortAdapter;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockBusHandle, MockSerialAdapter};

/// 串口适配层统一错误类型
#[derive(Error, Debug)]
pub enum SerialError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(#[from] SerialDeviceError),
    #[error("Read timeout")]
    Timeout,
    #[error("Port closed")]
    Closed,
}

impl SerialError {
    /// 是否为不可恢复的设备错误（设备不存在、权限不足）
    pub fn is_fatal(&self) -> bool {
        match self {
            SerialError::Device(e) => e.is_fatal(),
            SerialError::Closed => true,
            _ => false,
        }
    }
}

/// 设备错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialDeviceErrorKind {
    Unknown,
    NotFound,
    AccessDenied,
    Busy,
    InvalidConfig,
}

/// 结构化设备错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct SerialDeviceError {
    pub kind: SerialDeviceErrorKind,
    pub message: String,
}

impl SerialDeviceError {
    pub fn new(kind: SerialDeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            SerialDeviceErrorKind::NotFound | SerialDeviceErrorKind::AccessDenied
        )
    }
}

impl From<String> for SerialDeviceError {
    fn from(message: String) -> Self {
        Self::new(SerialDeviceErrorKind::Unknown, message)
    }
}

impl From<serialport::Error> for SerialError {
    fn from(err: serialport::Error) -> Self {
        let kind = match err.kind() {
            serialport::ErrorKind::NoDevice => SerialDeviceErrorKind::NotFound,
            serialport::ErrorKind::InvalidInput => SerialDeviceErrorKind::InvalidConfig,
            serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => {
                SerialDeviceErrorKind::NotFound
            },
            serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
                SerialDeviceErrorKind::AccessDenied
            },
            serialport::ErrorKind::Io(std::io::ErrorKind::ResourceBusy) => {
                SerialDeviceErrorKind::Busy
            },
            _ => SerialDeviceErrorKind::Unknown,
        };
        SerialError::Device(SerialDeviceError::new(kind, err.description))
    }
}

/// 半双工串口传输
///
/// 适配器被移动到驱动层的分发线程中独占使用，因此方法都是 `&mut self`，
/// 实现不需要内部加锁。
pub trait SerialAdapter {
    /// 写出完整字节序列
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError>;

    /// 读取可用字节
    ///
    /// 在 `timeout` 内至少读到 1 字节时返回 `Ok(n)`；
    /// 一个字节也没有时返回 `SerialError::Timeout`。
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, SerialError>;

    /// 丢弃输入缓冲区中尚未读取的字节
    fn clear_input(&mut self) -> Result<(), SerialError> {
        Ok(())
    }

    /// 端口描述（日志使用）
    fn describe(&self) -> String {
        "serial".to_string()
    }
}

impl<T: SerialAdapter + ?Sized> SerialAdapter for Box<T> {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        (**self).write_all(bytes)
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, SerialError> {
        (**self).read(buf, timeout)
    }

    fn clear_input(&mut self) -> Result<(), SerialError> {
        (**self).clear_input()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_fatal() {
        assert!(SerialDeviceError::new(SerialDeviceErrorKind::NotFound, "x").is_fatal());
        assert!(SerialDeviceError::new(SerialDeviceErrorKind::AccessDenied, "x").is_fatal());
        assert!(!SerialDeviceError::new(SerialDeviceErrorKind::Busy, "x").is_fatal());
        assert!(!SerialError::Timeout.is_fatal());
        assert!(SerialError::Closed.is_fatal());
    }

    #[test]
    fn test_from_serialport_error() {
        let err = serialport::Error::new(serialport::ErrorKind::NoDevice, "gone");
        let err = SerialError::from(err);
        match err {
            SerialError::Device(e) => {
                assert_eq!(e.kind, SerialDeviceErrorKind::NotFound);
                assert_eq!(e.message, "gone");
            },
            other => panic!("expected Device, got {other:?}"),
        }

        let err = serialport::Error::new(
            serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied),
            "denied",
        );
        assert!(SerialError::from(err).is_fatal());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(SerialError::Timeout.to_string(), "Read timeout");
        let err = SerialError::Device(SerialDeviceError::new(
            SerialDeviceErrorKind::Busy,
            "in use",
        ));
        assert_eq!(err.to_string(), "Device Error: Busy: in use");
    }
}
