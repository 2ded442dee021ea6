//! 分发队列中的请求类型

use crate::error::BusError;
use crossbeam_channel::Sender;
use puppet_protocol::Frame;
use std::time::{Duration, Instant};

/// 分发线程处理的请求
///
/// 所有请求经同一个 FIFO 通道进入分发线程，按到达顺序逐个处理，
/// 保证半双工总线上任意时刻至多一次进行中的交换。
#[derive(Debug)]
pub(crate) enum BusRequest {
    /// 只写不读（写目标位置）
    ///
    /// `ack` 为 `None` 时即发即忘，写出失败只记录日志与指标。
    Write {
        frame: Frame,
        ack: Option<Sender<Result<(), BusError>>>,
    },
    /// 写出后等待应答
    ///
    /// `deadline` 在提交时确定，排队时间计入超时；`timeout` 只用于错误报告。
    Exchange {
        frame: Frame,
        deadline: Instant,
        timeout: Duration,
        reply: Sender<Result<Frame, BusError>>,
    },
    /// 屏障：之前排队的请求全部处理完后回应
    Flush { done: Sender<()> },
}

impl BusRequest {
    /// 请求类型名称（日志使用）
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            BusRequest::Write { .. } => "write",
            BusRequest::Exchange { .. } => "exchange",
            BusRequest::Flush { .. } => "flush",
        }
    }
}
