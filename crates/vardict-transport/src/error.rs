use std::io;
use std::os::fd::RawFd;

use thiserror::Error;

/// 构造上报器时的错误码。
pub(crate) const INVALID_DESCRIPTOR: &str = "vardict.transport.invalid_descriptor";

/// 上报器构造失败。
///
/// # Why
/// - 运行期的发送失败只影响遥测，而构造失败意味着协调器交来的描述符根本不可用，
///   宿主会话会把它升级为致命错误，因此单独成型。
#[derive(Debug, Error)]
pub enum ReporterError {
    /// 复制描述符失败，通常是 `EBADF`。
    #[error("coordinator socket descriptor {fd} is unusable: {source}")]
    InvalidDescriptor {
        /// 宿主交来的描述符值。
        fd: RawFd,
        /// 原始 IO 错误。
        #[source]
        source: io::Error,
    },
}

impl ReporterError {
    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            ReporterError::InvalidDescriptor { .. } => INVALID_DESCRIPTOR,
        }
    }
}
