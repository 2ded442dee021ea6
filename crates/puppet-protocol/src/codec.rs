//! 帧编解码
//!
//! 纯函数、无状态：编码生成 `[SYNC, SYNC, ADDR, LEN, CMD, PARAM..., CHK]`，
//! 解码依次校验同步字节、长度字段、校验和，任何一项不符都返回类型化错误，
//! 不会把原始字节交给上层。

use crate::{
    ChecksumPolicy, Frame, FramingError, MIN_FRAME_LEN, ProtocolError, ProtocolVariant,
};

/// 帧编解码器
///
/// 由同步字节和校验和策略两项参数决定，通常通过 [`ProtocolVariant`] 创建，
/// 需要兼容非标准固件时可以用 [`FrameCodec::with_checksum`] 覆盖校验策略。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCodec {
    sync: u8,
    checksum: ChecksumPolicy,
}

impl FrameCodec {
    /// 使用协议变体的默认同步字节和校验策略
    pub const fn new(variant: ProtocolVariant) -> Self {
        Self {
            sync: variant.sync_byte(),
            checksum: variant.default_checksum(),
        }
    }

    /// 使用自定义同步字节和校验策略
    pub const fn with_sync(sync: u8, checksum: ChecksumPolicy) -> Self {
        Self { sync, checksum }
    }

    /// 覆盖校验策略
    pub const fn with_checksum(mut self, checksum: ChecksumPolicy) -> Self {
        self.checksum = checksum;
        self
    }

    /// 同步字节
    pub const fn sync(&self) -> u8 {
        self.sync
    }

    /// 校验策略
    pub const fn checksum_policy(&self) -> ChecksumPolicy {
        self.checksum
    }

    /// 编码帧
    pub fn encode(&self, frame: &Frame) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(frame.wire_len());
        self.encode_into(frame, &mut bytes);
        bytes
    }

    /// 编码帧并追加到缓冲区（热路径复用缓冲区，避免分配）
    pub fn encode_into(&self, frame: &Frame, out: &mut Vec<u8>) {
        let start = out.len();
        out.push(self.sync);
        out.push(self.sync);
        out.push(frame.address());
        out.push(frame.length_byte());
        out.push(frame.command());
        out.extend_from_slice(frame.params());
        let checksum = self.checksum.compute(&out[start + 2..]);
        out.push(checksum);
    }

    /// 由分量直接编码
    ///
    /// # 错误
    /// - `ProtocolError::ParamsTooLong`: 参数超过 253 字节
    pub fn encode_parts(
        &self,
        address: u8,
        command: u8,
        params: &[u8],
    ) -> Result<Vec<u8>, ProtocolError> {
        Ok(self.encode(&Frame::new(address, command, params)?))
    }

    /// 解码一个完整帧
    ///
    /// `bytes` 必须恰好是一帧（首字节为同步字节，末字节为校验和）。
    ///
    /// # 错误
    /// - `ProtocolError::Framing`: 同步字节缺失/不一致、长度字段与实际负载不符
    /// - `ProtocolError::Checksum`: 校验和不符
    pub fn decode(&self, bytes: &[u8]) -> Result<Frame, ProtocolError> {
        if bytes.len() < MIN_FRAME_LEN {
            return Err(FramingError::TooShort {
                actual: bytes.len(),
            }
            .into());
        }

        let (first, second) = (bytes[0], bytes[1]);
        if first != second {
            return Err(FramingError::SyncMismatch { first, second }.into());
        }
        if first != self.sync {
            return Err(FramingError::UnexpectedSync {
                expected: self.sync,
                found: first,
            }
            .into());
        }

        let declared = bytes[3];
        if declared < 2 {
            return Err(FramingError::InvalidLength(declared).into());
        }
        // LEN 覆盖 CMD + PARAM + CHK
        let actual = bytes.len() - 4;
        if declared as usize != actual {
            return Err(FramingError::LengthMismatch {
                declared: declared as usize,
                actual,
            }
            .into());
        }

        let last = bytes.len() - 1;
        let expected = self.checksum.compute(&bytes[2..last]);
        if expected != bytes[last] {
            return Err(ProtocolError::Checksum {
                expected,
                actual: bytes[last],
            });
        }

        Ok(Frame::from_parts(bytes[2], bytes[4], &bytes[5..last]))
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(ProtocolVariant::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_feetech_read_position() {
        let codec = FrameCodec::new(ProtocolVariant::Feetech);
        let bytes = codec.encode_parts(1, 0x02, &[0x38, 0x02]).unwrap();
        assert_eq!(bytes, vec![0xFF, 0xFF, 0x01, 0x04, 0x02, 0x38, 0x02, 0xBE]);
    }

    #[test]
    fn test_encode_additive_formula() {
        let codec = FrameCodec::with_sync(0x55, ChecksumPolicy::Additive);
        let params = [0x01u8, 0xF4, 0x01, 0x00, 0xE8, 0x03];
        let bytes = codec.encode_parts(0x01, 0x03, &params).unwrap();

        let length = (params.len() + 2) as u32;
        let sum: u32 = 0x01 + length + 0x03 + params.iter().map(|&b| b as u32).sum::<u32>();
        assert_eq!(bytes[0], 0x55);
        assert_eq!(bytes[1], 0x55);
        assert_eq!(bytes[3] as u32, length);
        assert_eq!(*bytes.last().unwrap() as u32, sum & 0xFF);
    }

    #[test]
    fn test_decode_roundtrip_no_params() {
        let codec = FrameCodec::new(ProtocolVariant::LxBus);
        let frame = Frame::new(3, 0x1C, &[]).unwrap();
        let bytes = codec.encode(&frame);
        assert_eq!(bytes.len(), 6);
        assert_eq!(codec.decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn test_decode_too_short() {
        let codec = FrameCodec::default();
        let err = codec.decode(&[0xFF, 0xFF, 0x01]).unwrap_err();
        assert_eq!(err, FramingError::TooShort { actual: 3 }.into());
    }

    #[test]
    fn test_decode_sync_mismatch() {
        let codec = FrameCodec::default();
        let err = codec
            .decode(&[0xFF, 0xFE, 0x01, 0x02, 0x01, 0xFB])
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Framing(FramingError::SyncMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_wrong_variant_sync() {
        let lx = FrameCodec::new(ProtocolVariant::LxBus);
        let feetech = FrameCodec::new(ProtocolVariant::Feetech);
        let bytes = lx.encode(&Frame::new(1, 0x1C, &[]).unwrap());
        let err = feetech.decode(&bytes).unwrap_err();
        assert_eq!(
            err,
            FramingError::UnexpectedSync {
                expected: 0xFF,
                found: 0x55
            }
            .into()
        );
    }

    #[test]
    fn test_decode_length_mismatch() {
        let codec = FrameCodec::default();
        let mut bytes = codec.encode(&Frame::new(1, 0x02, &[0x38, 0x02]).unwrap());
        bytes.insert(5, 0x00);
        let err = codec.decode(&bytes).unwrap_err();
        assert_eq!(
            err,
            FramingError::LengthMismatch {
                declared: 4,
                actual: 5
            }
            .into()
        );
    }

    #[test]
    fn test_decode_invalid_length_byte() {
        let codec = FrameCodec::default();
        let err = codec
            .decode(&[0xFF, 0xFF, 0x01, 0x01, 0x02, 0x00])
            .unwrap_err();
        assert_eq!(err, FramingError::InvalidLength(1).into());
    }

    #[test]
    fn test_decode_checksum_mismatch() {
        let codec = FrameCodec::default();
        let mut bytes = codec.encode(&Frame::new(1, 0x02, &[0x38, 0x02]).unwrap());
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let err = codec.decode(&bytes).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::Checksum {
                expected: 0xBE,
                actual: 0xBF
            }
        );
    }

    #[test]
    fn test_checksum_override() {
        let additive = FrameCodec::new(ProtocolVariant::Feetech).with_checksum(ChecksumPolicy::Additive);
        let inverted = FrameCodec::new(ProtocolVariant::Feetech);
        let frame = Frame::new(1, 0x02, &[0x38, 0x02]).unwrap();

        let bytes = additive.encode(&frame);
        assert_eq!(*bytes.last().unwrap(), 0x41);
        assert!(inverted.decode(&bytes).is_err());
        assert_eq!(additive.decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn test_encode_into_appends() {
        let codec = FrameCodec::default();
        let mut buf = vec![0xAA];
        codec.encode_into(&Frame::new(1, 0x01, &[]).unwrap(), &mut buf);
        assert_eq!(buf[0], 0xAA);
        assert_eq!(codec.decode(&buf[1..]).unwrap().command(), 0x01);
    }
}
