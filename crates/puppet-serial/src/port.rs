//! 基于 `serialport` 的真实串口适配器

use crate::{SerialAdapter, SerialError};
use serialport::{ClearBuffer, SerialPort};
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use tracing::{debug, info, trace};

/// 打开端口时的默认读超时（之后每次读取按调用方的超时重设）
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

/// 真实串口适配器
pub struct SerialPortAdapter {
    port: Box<dyn SerialPort>,
    path: String,
    baud_rate: u32,
    /// 当前设置在端口上的读超时（避免每次读取都做一次系统调用）
    current_timeout: Duration,
}

impl SerialPortAdapter {
    /// 打开串口（8N1，无流控）
    ///
    /// # 错误
    /// - `SerialError::Device`: 设备不存在（`NotFound`）、权限不足（`AccessDenied`）等
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, SerialError> {
        let port = serialport::new(path, baud_rate).timeout(DEFAULT_TIMEOUT).open()?;
        info!("Opened serial port {} at {} baud", path, baud_rate);

        let mut adapter = Self {
            port,
            path: path.to_string(),
            baud_rate,
            current_timeout: DEFAULT_TIMEOUT,
        };
        // 上电时舵机可能打印启动信息，先清空
        adapter.clear_input()?;
        Ok(adapter)
    }

    /// 端口路径
    pub fn path(&self) -> &str {
        &self.path
    }

    /// 波特率
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    fn apply_timeout(&mut self, timeout: Duration) -> Result<(), SerialError> {
        if timeout != self.current_timeout {
            self.port.set_timeout(timeout)?;
            self.current_timeout = timeout;
        }
        Ok(())
    }
}

impl SerialAdapter for SerialPortAdapter {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        trace!("{}: wrote {} bytes", self.path, bytes.len());
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, SerialError> {
        // 零超时在部分平台上表示"永久阻塞"
        let timeout = timeout.max(Duration::from_millis(1));
        self.apply_timeout(timeout)?;

        match self.port.read(buf) {
            Ok(0) => Err(SerialError::Timeout),
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                Err(SerialError::Timeout)
            },
            Err(e) => Err(SerialError::Io(e)),
        }
    }

    fn clear_input(&mut self) -> Result<(), SerialError> {
        self.port.clear(ClearBuffer::Input)?;
        debug!("{}: input buffer cleared", self.path);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{}@{}", self.path, self.baud_rate)
    }
}
