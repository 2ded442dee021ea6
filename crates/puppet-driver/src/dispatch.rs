//! 分发线程
//!
//! 分发线程独占串口适配器，从请求队列中逐个取出请求执行。
//! 写请求直接写出；交换请求在写出后读取字节流，经 [`FrameAssembler`] 组装成应答帧。

use crate::command::BusRequest;
use crate::error::BusError;
use crate::metrics::BusMetrics;
use crossbeam_channel::Receiver;
use puppet_protocol::{Frame, FrameAssembler, FrameCodec};
use puppet_serial::{SerialAdapter, SerialError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// 单次读取的缓冲区大小
const READ_CHUNK: usize = 64;

/// 分发线程状态
pub(crate) struct Dispatcher<A> {
    adapter: A,
    codec: FrameCodec,
    assembler: FrameAssembler,
    /// 适配器会回显写出的字节（TX/RX 短接的单线半双工）
    ///
    /// 开启时每次交换写出后收到的第一帧若与请求相同，视为回显丢弃。
    echo: bool,
    tx_buf: Vec<u8>,
    metrics: Arc<BusMetrics>,
}

impl<A: SerialAdapter> Dispatcher<A> {
    pub(crate) fn new(adapter: A, codec: FrameCodec, echo: bool, metrics: Arc<BusMetrics>) -> Self {
        Self {
            adapter,
            codec,
            assembler: FrameAssembler::new(codec),
            echo,
            tx_buf: Vec::with_capacity(32),
            metrics,
        }
    }

    /// 分发循环
    ///
    /// 请求通道断开（所有 `MotorBus` 句柄都已 drop）时退出。
    pub(crate) fn run(mut self, rx: Receiver<BusRequest>) {
        while let Ok(request) = rx.recv() {
            trace!("dispatch: {}", request.kind());
            match request {
                BusRequest::Write { frame, ack } => {
                    let result = self.write_frame(&frame);
                    if let Err(e) = &result {
                        warn!("Write to 0x{:02X} failed: {}", frame.address(), e);
                    }
                    if let Some(ack) = ack {
                        let _ = ack.send(result);
                    }
                },
                BusRequest::Exchange {
                    frame,
                    deadline,
                    timeout,
                    reply,
                } => {
                    let result = self.exchange(&frame, deadline, timeout);
                    // 调用方可能已经放弃等待
                    let _ = reply.send(result);
                },
                BusRequest::Flush { done } => {
                    let _ = done.send(());
                },
            }
        }

        debug!("Dispatch loop exiting: {}", self.adapter.describe());
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<(), BusError> {
        self.tx_buf.clear();
        self.codec.encode_into(frame, &mut self.tx_buf);
        trace!("TX {}", hex::encode(self.tx_buf.as_slice()));

        match self.adapter.write_all(&self.tx_buf) {
            Ok(()) => {
                BusMetrics::incr(&self.metrics.frames_written);
                Ok(())
            },
            Err(e) => {
                BusMetrics::incr(&self.metrics.write_failures);
                Err(BusError::Serial(e))
            },
        }
    }

    fn timed_out(&self, address: u8, timeout: Duration) -> BusError {
        BusMetrics::incr(&self.metrics.timeouts);
        BusError::Timeout { address, timeout }
    }

    /// 一次请求-应答交换
    ///
    /// `deadline` 在调用方提交请求时确定；在队列中等待到过期的请求不再写出。
    /// 损坏的应答直接作为错误返回，不重试：是否重试由调用方决定。
    fn exchange(
        &mut self,
        request: &Frame,
        deadline: Instant,
        timeout: Duration,
    ) -> Result<Frame, BusError> {
        let address = request.address();
        if Instant::now() >= deadline {
            debug!("Exchange with 0x{:02X} expired in queue", address);
            return Err(self.timed_out(address, timeout));
        }
        BusMetrics::incr(&self.metrics.exchanges);

        // 丢弃上一次交换残留的过期字节
        self.assembler.clear();
        self.adapter.clear_input()?;

        self.write_frame(request)?;

        let mut echo_pending = self.echo;
        let mut buf = [0u8; READ_CHUNK];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(self.timed_out(address, timeout));
            }

            let n = match self.adapter.read(&mut buf, remaining) {
                Ok(n) => n,
                Err(SerialError::Timeout) => return Err(self.timed_out(address, timeout)),
                Err(e) => return Err(BusError::Serial(e)),
            };
            trace!("RX {}", hex::encode(&buf[..n]));
            self.assembler.push(&buf[..n]);

            while let Some(result) = self.assembler.next_frame() {
                match result {
                    Ok(frame) => {
                        // Feetech 应答的状态字节与指令码同位，只能按位置识别回显
                        if std::mem::take(&mut echo_pending) && frame == *request {
                            BusMetrics::incr(&self.metrics.echoes_filtered);
                            trace!("Ignoring echo of request to 0x{:02X}", address);
                            continue;
                        }
                        if frame.address() == address {
                            return Ok(frame);
                        }
                        debug!(
                            "Ignoring stray frame from 0x{:02X} while waiting for 0x{:02X}",
                            frame.address(),
                            address
                        );
                    },
                    Err(e) => {
                        BusMetrics::incr(&self.metrics.corrupt_replies);
                        warn!("Corrupt reply from 0x{:02X}: {}", address, e);
                        return Err(BusError::Protocol(e));
                    },
                }
            }
        }
    }
}
