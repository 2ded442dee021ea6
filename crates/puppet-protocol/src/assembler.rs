//! 流式帧组装
//!
//! 串口读取得到的是任意切分的字节流：一次读取可能只包含半帧，也可能在帧前夹杂
//! 上一次交换残留的噪声字节。`FrameAssembler` 缓存字节，在同步字节对处重新同步，
//! 凑齐 LEN 声明的长度后交给 [`FrameCodec::decode`] 校验。

use crate::{Frame, FrameCodec, FramingError, ProtocolError};
use bytes::{Buf, BytesMut};

/// 缓冲区上限（超过则丢弃最旧的数据，防止噪声无限累积）
const MAX_BUFFERED: usize = 1024;

/// 流式帧组装器
#[derive(Debug)]
pub struct FrameAssembler {
    codec: FrameCodec,
    buf: BytesMut,
    discarded: usize,
}

impl FrameAssembler {
    /// 创建组装器
    pub fn new(codec: FrameCodec) -> Self {
        Self {
            codec,
            buf: BytesMut::with_capacity(64),
            discarded: 0,
        }
    }

    /// 追加读取到的字节
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        if self.buf.len() > MAX_BUFFERED {
            let overflow = self.buf.len() - MAX_BUFFERED;
            self.buf.advance(overflow);
            self.discarded += overflow;
        }
    }

    /// 取出下一帧
    ///
    /// - `None`: 数据不足一帧
    /// - `Some(Ok(frame))`: 校验通过的帧
    /// - `Some(Err(e))`: 长度字段非法或校验失败（损坏的字节已被消费）
    pub fn next_frame(&mut self) -> Option<Result<Frame, ProtocolError>> {
        let sync = self.codec.sync();

        // 1. 定位同步字节对
        let start = self.buf.windows(2).position(|w| w[0] == sync && w[1] == sync);
        match start {
            Some(0) => {},
            Some(offset) => {
                self.buf.advance(offset);
                self.discarded += offset;
            },
            None => {
                // 保留末尾可能是半个同步对的字节
                let keep = usize::from(self.buf.last() == Some(&sync));
                let drop = self.buf.len() - keep;
                self.buf.advance(drop);
                self.discarded += drop;
                return None;
            },
        }

        if self.buf.len() < 4 {
            return None;
        }

        // 2. 长度字段
        let declared = self.buf[3];
        if declared < 2 {
            // 跳过一个字节，下次从后续位置重新同步
            self.buf.advance(1);
            self.discarded += 1;
            return Some(Err(FramingError::InvalidLength(declared).into()));
        }

        let total = 4 + declared as usize;
        if self.buf.len() < total {
            return None;
        }

        // 3. 完整帧交给编解码器校验
        let raw = self.buf.split_to(total);
        Some(self.codec.decode(&raw))
    }

    /// 清空缓冲区（新一轮交换前调用，丢弃过期应答）
    pub fn clear(&mut self) {
        self.discarded += self.buf.len();
        self.buf.clear();
    }

    /// 当前缓存的字节数
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// 累计丢弃的噪声字节数
    pub fn discarded(&self) -> usize {
        self.discarded
    }
}
