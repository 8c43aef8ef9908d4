#![deny(unsafe_code)]
#![warn(missing_docs)]
#![doc = r#"
# vardict-transport

## 设计动机（Why）
- **定位**：把 `vardict-core` 的 [`AccessSink`](vardict_core::AccessSink) 接缝落到真实连接上，
  每次变量命中向构建协调器写出一帧访问事件。
- **架构角色**：连接由协调器在拉起预处理进程前建立，本 crate 只接收其描述符，
  从不自行创建、重连或关闭对端。

## 核心契约（What）
- **输入条件**：描述符指向一个已连接的套接字（通常是 Unix 域套接字）；
- **输出保障**：每次 `report` 恰好尝试一次 `send`，成功则整帧写出；
  失败以 [`ReportError`](vardict_core::ReportError) 返回并计入丢弃统计；
- **前置约束**：不做批量与排队，也不设超时，连接被假定为本地且可靠。

## 实现策略（How）
- **Linux**：通过 `nix` 以 `MSG_NOSIGNAL` 发送，对端关闭时得到 `EPIPE` 而非信号；
- **其它 Unix**：使用 `socket2` 的 `SockRef::send`，依赖宿主忽略 `SIGPIPE`；
- **描述符所有权**：构造时复制描述符，宿主原有描述符不受本 crate 生命周期影响。

## 风险与考量（Trade-offs）
- 流式套接字上的短写会让协调器看到半帧；当前按传输错误上报，不尝试补写。
"#]

mod error;
mod reporter;
mod send;

pub use error::ReporterError;
pub use reporter::{ReporterStats, SocketReporter};
