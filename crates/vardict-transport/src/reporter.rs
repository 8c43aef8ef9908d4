use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, OwnedFd};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;
use vardict_core::{AccessEvent, AccessSink, ReportError};

use crate::error::ReporterError;
use crate::send::{ensure_socket, send_once};

/// 经由已连接套接字上报变量访问的 [`AccessSink`] 实现。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 协调器据访问事件建立“产物 → 变量”依赖边，变量值变化时只重建真正受影响的产物；
/// - 上报属于旁路遥测：宁可丢事件也不能阻止预处理继续。
///
/// ## 逻辑 (How)
/// - `report` 先用 [`AccessEvent::encode`] 拼好整帧（含超限检查），再调用一次 `send`；
/// - 成功与失败分别计数，便于宿主在退出前输出统计；
/// - 描述符在构造时复制并由本结构体独占，`Drop` 只关闭副本。
///
/// ## 契约 (What)
/// - `report`：成功即整帧已交给内核；短写与系统调用失败都返回 `Transport`；
/// - `stats`：返回单调递增的计数快照；
/// - 结构体 `Send + Sync`，多个线程可并发上报，每帧由单次 `send` 写出。
///
/// ## 注意事项 (Trade-offs)
/// - 并发上报时帧之间不会交错（单次 `send` 对 Unix 域流套接字在缓冲充足时是原子的），
///   但缓冲不足导致的短写无法恢复，此时协调器应丢弃该连接上的后续数据。
#[derive(Debug)]
pub struct SocketReporter {
    fd: OwnedFd,
    sent: AtomicU64,
    dropped: AtomicU64,
}

/// 上报计数快照。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReporterStats {
    /// 成功写出的事件数。
    pub sent: u64,
    /// 因超限或传输失败而丢弃的事件数。
    pub dropped: u64,
}

impl SocketReporter {
    /// 接管一个已连接套接字的描述符。
    pub fn new(fd: OwnedFd) -> Self {
        Self {
            fd,
            sent: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// 复制宿主交来的描述符并以副本构造。
    ///
    /// 描述符必须指向套接字；普通文件、管道等在这里被拒绝，而不是等到首次上报才失败。
    pub fn from_fd(fd: BorrowedFd<'_>) -> Result<Self, ReporterError> {
        let invalid = |source| ReporterError::InvalidDescriptor {
            fd: fd.as_raw_fd(),
            source,
        };
        ensure_socket(fd).map_err(invalid)?;
        let owned = fd.try_clone_to_owned().map_err(invalid)?;
        Ok(Self::new(owned))
    }

    /// 计数快照。
    pub fn stats(&self) -> ReporterStats {
        ReporterStats {
            sent: self.sent.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    fn send_frame(&self, frame: &[u8]) -> Result<(), ReportError> {
        let written = send_once(&self.fd, frame).map_err(|source| ReportError::Transport { source })?;
        if written != frame.len() {
            return Err(ReportError::Transport {
                source: io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("short write: {written} of {} bytes", frame.len()),
                ),
            });
        }
        Ok(())
    }
}

impl AccessSink for SocketReporter {
    fn report(&self, key: &[u8]) -> Result<(), ReportError> {
        let result = AccessEvent::var_access(key)
            .encode()
            .and_then(|frame| self.send_frame(&frame));
        match &result {
            Ok(()) => {
                self.sent.fetch_add(1, Ordering::Relaxed);
                debug!(
                    key = %String::from_utf8_lossy(key),
                    fd = self.fd.as_raw_fd(),
                    "vardict access event sent"
                );
            }
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixStream;

    #[test]
    fn stats_start_at_zero() {
        let (local, _peer) = UnixStream::pair().expect("socketpair");
        let reporter = SocketReporter::new(OwnedFd::from(local));
        assert_eq!(reporter.stats(), ReporterStats::default());
    }

    #[test]
    fn oversize_key_is_dropped_without_io() {
        let (local, peer) = UnixStream::pair().expect("socketpair");
        let reporter = SocketReporter::new(OwnedFd::from(local));
        let key = vec![b'K'; vardict_core::MAX_FRAME_PAYLOAD];

        let err = reporter.report(&key).expect_err("oversize key must fail");
        assert!(matches!(err, ReportError::Oversize { .. }));
        assert_eq!(reporter.stats().dropped, 1);

        peer.set_nonblocking(true).expect("nonblocking");
        let mut buf = [0u8; 16];
        let read = io::Read::read(&mut &peer, &mut buf);
        assert_eq!(
            read.map_err(|err| err.kind()),
            Err(io::ErrorKind::WouldBlock)
        );
    }
}
