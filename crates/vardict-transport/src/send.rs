//! 单帧发送的平台实现。
//!
//! # 设计要点（How）
//! - `cfg(target_os = "linux")`：`nix::sys::socket::send` + `MSG_NOSIGNAL`；
//! - 其它 Unix：`socket2::SockRef::send`，行为等价但依赖进程忽略 `SIGPIPE`。
//!
//! 两条路径都只发起一次系统调用，返回内核报告的写入字节数。
//! 构造期的套接字类型检查同样按平台分流。

use std::io;
use std::os::fd::{BorrowedFd, OwnedFd};

#[cfg(target_os = "linux")]
pub(crate) fn send_once(fd: &OwnedFd, frame: &[u8]) -> io::Result<usize> {
    use nix::sys::socket::{MsgFlags, send};
    use std::os::fd::AsRawFd;

    send(fd.as_raw_fd(), frame, MsgFlags::MSG_NOSIGNAL).map_err(io::Error::from)
}

#[cfg(all(unix, not(target_os = "linux")))]
pub(crate) fn send_once(fd: &OwnedFd, frame: &[u8]) -> io::Result<usize> {
    socket2::SockRef::from(fd).send(frame)
}

/// 确认描述符是套接字；否则返回 `ENOTSOCK` 等底层错误。
#[cfg(target_os = "linux")]
pub(crate) fn ensure_socket(fd: BorrowedFd<'_>) -> io::Result<()> {
    use nix::sys::socket::{getsockopt, sockopt};

    getsockopt(&fd, sockopt::SockType)
        .map(|_| ())
        .map_err(io::Error::from)
}

#[cfg(all(unix, not(target_os = "linux")))]
pub(crate) fn ensure_socket(fd: BorrowedFd<'_>) -> io::Result<()> {
    socket2::SockRef::from(&fd).r#type().map(|_| ())
}
