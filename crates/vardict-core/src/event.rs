//! 依赖事件线格式与上报接缝。
//!
//! # 线格式（What）
//! ```text
//! kind:     u32   （ACCESS_VAR = 4，与协调器的访问类型枚举对齐）
//! len:      u32   （键长 + 1）
//! reserved: u32   （恒为 0）
//! payload:  [u8; len]  键字节 + NUL
//! ```
//! 三个头部字段均为本机字节序，帧作为一条消息整体写出。
//!
//! # 设计要点（How）
//! - 编码端在写出前检查负载上限，超限直接返回 [`ReportError::Oversize`]，不产生任何 IO；
//! - 解码端是协调器视角的校验解析，用于测试与离线排障；
//! - [`AccessSink`] 是字典与具体传输之间唯一的接缝，字典查找只依赖该 trait。

use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{EventDecodeError, ReportError};

/// 变量访问事件类型值。
pub const ACCESS_VAR: u32 = 4;

/// 事件头部长度（三个 `u32`）。
pub const EVENT_HEADER_LEN: usize = 3 * size_of::<u32>();

/// 单帧负载（键长 + 1）的上限，取路径长度常量；负载达到该值即视为超限。
pub const MAX_FRAME_PAYLOAD: usize = 4096;

/// 一条变量访问事件。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessEvent<'a> {
    key: &'a [u8],
}

impl<'a> AccessEvent<'a> {
    /// 以被访问的键构造事件。
    pub fn var_access(key: &'a [u8]) -> Self {
        Self { key }
    }

    /// 被访问的键（不含结尾 NUL）。
    pub fn key(&self) -> &'a [u8] {
        self.key
    }

    /// 负载长度：键长 + 结尾 NUL。
    pub fn payload_len(&self) -> usize {
        self.key.len() + 1
    }

    /// 整帧长度。
    pub fn frame_len(&self) -> usize {
        EVENT_HEADER_LEN + self.payload_len()
    }

    /// 编码为一帧。
    ///
    /// # 教案式注释
    /// - **Why**：上报路径只允许一次写出，帧必须在内存中完整拼好；
    /// - **How**：先校验 `payload_len < MAX_FRAME_PAYLOAD`，再按头部、键、NUL 顺序写入 `BytesMut`；
    /// - **What**：成功返回冻结后的只读帧；超限返回 `Oversize`，不做截断。
    pub fn encode(&self) -> Result<Bytes, ReportError> {
        let len = self.payload_len();
        if len >= MAX_FRAME_PAYLOAD {
            return Err(ReportError::Oversize {
                len,
                limit: MAX_FRAME_PAYLOAD,
            });
        }
        let mut frame = BytesMut::with_capacity(EVENT_HEADER_LEN + len);
        frame.put_u32_ne(ACCESS_VAR);
        // len < MAX_FRAME_PAYLOAD，必然落在 u32 范围内。
        frame.put_u32_ne(len as u32);
        frame.put_u32_ne(0);
        frame.put_slice(self.key);
        frame.put_u8(0);
        Ok(frame.freeze())
    }

    /// 从帧首部解析一条事件，返回事件与消耗的字节数。
    pub fn decode(frame: &'a [u8]) -> Result<(Self, usize), EventDecodeError> {
        if frame.len() < EVENT_HEADER_LEN {
            return Err(EventDecodeError::Truncated {
                needed: EVENT_HEADER_LEN,
                available: frame.len(),
            });
        }
        let kind = read_u32(frame, 0);
        let len = read_u32(frame, 4) as usize;
        if kind != ACCESS_VAR {
            return Err(EventDecodeError::UnexpectedKind(kind));
        }
        let needed = EVENT_HEADER_LEN.checked_add(len).ok_or(EventDecodeError::Truncated {
            needed: usize::MAX,
            available: frame.len(),
        })?;
        let Some(payload) = frame.get(EVENT_HEADER_LEN..needed) else {
            return Err(EventDecodeError::Truncated {
                needed,
                available: frame.len(),
            });
        };
        match payload.split_last() {
            Some((0, key)) => Ok((Self { key }, needed)),
            _ => Err(EventDecodeError::MissingTerminator),
        }
    }
}

fn read_u32(frame: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&frame[at..at + 4]);
    u32::from_ne_bytes(raw)
}

/// 变量访问事件的接收端。
///
/// # 教案式注释
/// - **意图 (Why)**：把“查找命中”与“事件如何送达”解耦，字典不感知套接字，测试可注入记录型实现；
/// - **契约 (What)**：
///   - `report` 每次调用最多执行一次同步写出，不排队、不重试；
///   - 返回错误仅供日志使用，调用方不得据此改变解析结果；
///   - 实现必须 `Send + Sync`，字典查找可能发生在任意线程；
/// - **风险 (Trade-offs)**：同步写出意味着协调器读取缓慢时会阻塞查找，当前部署下连接为本地
///   套接字，未设超时。
pub trait AccessSink: Send + Sync {
    /// 上报一次变量访问。
    fn report(&self, key: &[u8]) -> Result<(), ReportError>;
}

impl<S: AccessSink + ?Sized> AccessSink for &S {
    fn report(&self, key: &[u8]) -> Result<(), ReportError> {
        (**self).report(key)
    }
}

impl<S: AccessSink + ?Sized> AccessSink for Box<S> {
    fn report(&self, key: &[u8]) -> Result<(), ReportError> {
        (**self).report(key)
    }
}

impl<S: AccessSink + ?Sized> AccessSink for Arc<S> {
    fn report(&self, key: &[u8]) -> Result<(), ReportError> {
        (**self).report(key)
    }
}

/// 丢弃所有事件的接收端，用于不需要依赖追踪的离线查询。
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl AccessSink for NoopSink {
    fn report(&self, _key: &[u8]) -> Result<(), ReportError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_layout_is_header_key_nul() {
        let frame = AccessEvent::var_access(b"FOO").encode().expect("encode");
        let mut expected = Vec::new();
        expected.extend_from_slice(&ACCESS_VAR.to_ne_bytes());
        expected.extend_from_slice(&4u32.to_ne_bytes());
        expected.extend_from_slice(&0u32.to_ne_bytes());
        expected.extend_from_slice(b"FOO\0");
        assert_eq!(&frame[..], &expected[..]);
    }

    #[test]
    fn payload_at_limit_is_oversize() {
        let key = vec![b'K'; MAX_FRAME_PAYLOAD - 1];
        let err = AccessEvent::var_access(&key)
            .encode()
            .expect_err("len == limit must be rejected");
        assert!(matches!(
            err,
            ReportError::Oversize {
                len: MAX_FRAME_PAYLOAD,
                limit: MAX_FRAME_PAYLOAD
            }
        ));

        let key = vec![b'K'; MAX_FRAME_PAYLOAD - 2];
        assert!(AccessEvent::var_access(&key).encode().is_ok());
    }

    #[test]
    fn decode_reads_back_key_and_consumed_len() {
        let frame = AccessEvent::var_access(b"CONFIG").encode().expect("encode");
        let (event, used) = AccessEvent::decode(&frame).expect("decode");
        assert_eq!(event.key(), b"CONFIG");
        assert_eq!(used, frame.len());
    }

    #[test]
    fn decode_rejects_foreign_kind_and_missing_nul() {
        let mut frame = AccessEvent::var_access(b"A").encode().expect("encode").to_vec();
        frame[EVENT_HEADER_LEN + 1] = b'!';
        assert_eq!(
            AccessEvent::decode(&frame),
            Err(EventDecodeError::MissingTerminator)
        );

        frame[..4].copy_from_slice(&0u32.to_ne_bytes());
        assert_eq!(
            AccessEvent::decode(&frame),
            Err(EventDecodeError::UnexpectedKind(0))
        );
    }

    #[test]
    fn decode_rejects_huge_declared_length() {
        let mut frame = Vec::new();
        frame.extend_from_slice(&ACCESS_VAR.to_ne_bytes());
        frame.extend_from_slice(&u32::MAX.to_ne_bytes());
        frame.extend_from_slice(&0u32.to_ne_bytes());
        frame.extend_from_slice(b"K\0");
        assert!(matches!(
            AccessEvent::decode(&frame),
            Err(EventDecodeError::Truncated { available: 14, .. })
        ));
    }

    #[test]
    fn decode_reports_truncation() {
        let frame = AccessEvent::var_access(b"ABC").encode().expect("encode");
        assert_eq!(
            AccessEvent::decode(&frame[..frame.len() - 1]),
            Err(EventDecodeError::Truncated {
                needed: frame.len(),
                available: frame.len() - 1
            })
        );
    }
}
