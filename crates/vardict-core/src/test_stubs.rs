//! [`AccessSink`] 的测试桩集合。
//!
//! # 设计定位（Why）
//! - 字典、解析器与会话的测试都需要断言“哪些键被上报”，或模拟连接断开；
//! - 集中定义后，下游 crate 的集成测试直接复用，接口调整时只需改一处。
//!
//! # 契约说明（What）
//! - [`RecordingSink`] 按调用顺序记录全部键，永远成功；
//! - [`FailingSink`] 记录调用次数并始终返回 `Transport(BrokenPipe)`。

use std::io;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::ReportError;
use crate::event::AccessSink;

/// 记录全部上报键的接收端。
#[derive(Debug, Default)]
pub struct RecordingSink {
    keys: Mutex<Vec<Vec<u8>>>,
}

impl RecordingSink {
    /// 按上报顺序返回键的快照。
    pub fn keys(&self) -> Vec<Vec<u8>> {
        match self.keys.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AccessSink for RecordingSink {
    fn report(&self, key: &[u8]) -> Result<(), ReportError> {
        match self.keys.lock() {
            Ok(mut guard) => guard.push(key.to_vec()),
            Err(poisoned) => poisoned.into_inner().push(key.to_vec()),
        }
        Ok(())
    }
}

/// 模拟协调器已断开的接收端。
#[derive(Debug, Default)]
pub struct FailingSink {
    attempts: AtomicUsize,
}

impl FailingSink {
    /// 累计尝试次数。
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl AccessSink for FailingSink {
    fn report(&self, _key: &[u8]) -> Result<(), ReportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(ReportError::Transport {
            source: io::Error::from(io::ErrorKind::BrokenPipe),
        })
    }
}
