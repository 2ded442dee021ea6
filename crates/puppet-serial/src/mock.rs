//! Mock 串口适配器
//!
//! 在总线上模拟一组舵机：解析写入的指令帧，更新模拟位置，对读位置与 Ping 指令生成应答。
//! 测试通过 [`MockBusHandle`] 预置位置、注入故障、检查写出的帧。

use crate::{SerialAdapter, SerialError};
use parking_lot::Mutex;
use puppet_protocol::{Frame, FrameAssembler, FrameCodec, ProtocolVariant, ServoId};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct MockBusState {
    /// 在线舵机及其当前位置
    positions: BTreeMap<u8, u16>,
    /// 所有尝试写出的帧（包括注入写失败的帧）
    written: Vec<Frame>,
    /// 写入失败注入
    fail_writes: bool,
    /// 仅让接下来 N 次写入失败
    fail_next_writes: usize,
    /// 舵机不应答
    silent: bool,
    /// 应答校验和损坏
    corrupt_replies: bool,
    /// 应答前的噪声字节
    reply_noise: Vec<u8>,
    /// 舵机应答中的状态字节（Feetech）
    reply_status: u8,
    /// 写出的字节原样回显到接收端
    echo: bool,
}

/// Mock 总线控制句柄（可克隆，与适配器共享状态）
#[derive(Debug, Clone)]
pub struct MockBusHandle {
    variant: ProtocolVariant,
    state: Arc<Mutex<MockBusState>>,
}

impl MockBusHandle {
    /// 添加在线舵机并设置初始位置
    pub fn set_position(&self, id: u8, position: u16) {
        self.state.lock().positions.insert(id, position);
    }

    /// 移除舵机（之后对它的读取不再应答）
    pub fn remove_servo(&self, id: u8) {
        self.state.lock().positions.remove(&id);
    }

    /// 舵机的模拟位置
    pub fn position(&self, id: u8) -> Option<u16> {
        self.state.lock().positions.get(&id).copied()
    }

    /// 已写出的全部帧
    pub fn written_frames(&self) -> Vec<Frame> {
        self.state.lock().written.clone()
    }

    /// 发往指定舵机的全部目标位置（按写出顺序）
    pub fn written_positions(&self, id: u8) -> Vec<u16> {
        self.state
            .lock()
            .written
            .iter()
            .filter(|f| f.address() == id)
            .filter_map(|f| self.variant.decode_write_position(f))
            .collect()
    }

    /// 清空写出记录
    pub fn clear_written(&self) {
        self.state.lock().written.clear();
    }

    /// 所有写入都失败
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    /// 接下来 `count` 次写入失败
    pub fn fail_next_writes(&self, count: usize) {
        self.state.lock().fail_next_writes = count;
    }

    /// 舵机不应答（模拟超时）
    pub fn set_silent(&self, silent: bool) {
        self.state.lock().silent = silent;
    }

    /// 应答校验和损坏
    pub fn set_corrupt_replies(&self, corrupt: bool) {
        self.state.lock().corrupt_replies = corrupt;
    }

    /// 在每个应答前插入噪声字节
    pub fn set_reply_noise(&self, noise: &[u8]) {
        self.state.lock().reply_noise = noise.to_vec();
    }

    /// 应答中的状态字节
    pub fn set_reply_status(&self, status: u8) {
        self.state.lock().reply_status = status;
    }

    /// 写出的字节回显到接收端（单线半双工接法）
    pub fn set_echo(&self, echo: bool) {
        self.state.lock().echo = echo;
    }
}

/// Mock 串口适配器
pub struct MockSerialAdapter {
    variant: ProtocolVariant,
    codec: FrameCodec,
    assembler: FrameAssembler,
    rx: VecDeque<u8>,
    state: Arc<Mutex<MockBusState>>,
}

impl MockSerialAdapter {
    /// 使用变体默认编解码器
    pub fn new(variant: ProtocolVariant) -> Self {
        Self::with_codec(variant, variant.codec())
    }

    /// 使用自定义编解码器（校验策略覆盖）
    pub fn with_codec(variant: ProtocolVariant, codec: FrameCodec) -> Self {
        Self {
            variant,
            codec,
            assembler: FrameAssembler::new(codec),
            rx: VecDeque::new(),
            state: Arc::new(Mutex::new(MockBusState::default())),
        }
    }

    /// 获取控制句柄
    pub fn handle(&self) -> MockBusHandle {
        MockBusHandle {
            variant: self.variant,
            state: self.state.clone(),
        }
    }

    fn respond(&mut self, state: &mut MockBusState, frame: &Frame) {
        let address = frame.address();

        if let Some(target) = self.variant.decode_write_position(frame) {
            if let Some(position) = state.positions.get_mut(&address) {
                *position = target;
            }
            return;
        }

        if state.silent || !state.positions.contains_key(&address) {
            return;
        }
        let Ok(id) = ServoId::new(address) else {
            return;
        };

        let reply = if self.variant.is_read_position(frame) {
            let position = state.positions.get(&address).copied().unwrap_or_default();
            let [lo, hi] = position.to_le_bytes();
            match self.variant {
                ProtocolVariant::Feetech => Frame::new(address, state.reply_status, &[lo, hi]),
                ProtocolVariant::LxBus => Ok(self.variant.position_reply_frame(id, position)),
            }
        } else if self.variant.is_ping(frame) {
            match self.variant {
                ProtocolVariant::Feetech => Frame::new(address, state.reply_status, &[]),
                ProtocolVariant::LxBus => Frame::new(address, frame.command(), &[address]),
            }
        } else {
            return;
        };

        let Ok(reply) = reply else {
            return;
        };
        let mut bytes = self.codec.encode(&reply);
        if state.corrupt_replies
            && let Some(last) = bytes.last_mut()
        {
            *last ^= 0xFF;
        }
        self.rx.extend(state.reply_noise.iter().copied());
        self.rx.extend(bytes);
    }
}

impl SerialAdapter for MockSerialAdapter {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        self.assembler.push(bytes);
        let state_arc = self.state.clone();
        let mut state = state_arc.lock();

        let failing = state.fail_writes || state.fail_next_writes > 0;
        if state.fail_next_writes > 0 {
            state.fail_next_writes -= 1;
        }
        if state.echo && !failing {
            self.rx.extend(bytes.iter().copied());
        }

        while let Some(result) = self.assembler.next_frame() {
            let Ok(frame) = result else {
                continue;
            };
            state.written.push(frame.clone());
            if !failing {
                self.respond(&mut state, &frame);
            }
        }

        if failing {
            return Err(SerialError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "injected write failure",
            )));
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize, SerialError> {
        // 没有数据时立即超时，避免测试真的等待
        if self.rx.is_empty() {
            return Err(SerialError::Timeout);
        }
        let n = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn clear_input(&mut self) -> Result<(), SerialError> {
        self.rx.clear();
        Ok(())
    }

    fn describe(&self) -> String {
        format!("mock-{}", self.variant)
    }
}
