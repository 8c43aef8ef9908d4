#![deny(unsafe_code)]
#![warn(missing_docs)]
#![doc = r#"
# vardict-hosting

## 设计动机（Why）
- **定位**：把 `vardict-core` 的字典与解析器、`vardict-transport` 的上报器装配成预处理宿主可直接调用的会话；
- **架构角色**：位于依赖链最上层，负责配置读取、一次性初始化、致命错误处置与日志安装。

## 核心契约（What）
- [`Session`] 是显式会话值，可注入任意 [`SessionBootstrap`]，供测试与嵌入方使用；
- [`global`] 模块提供惰性全局会话与三个宏入口，初始化失败即终止进程；
- [`logging::install_stderr_logging`] 安装 stderr 日志，过滤指令取自 `VARDICT_LOG`。

## 实现策略（How）
- 句柄解析位于 [`config`]，与进程环境解耦；
- 初始化由 `spin::Once` 保证只执行一次，线程局部标记拦截同线程重入。

## 风险与考量（Trade-offs）
- 全局会话在进程退出前不会释放，映射与套接字副本随进程结束由内核回收。
"#]

pub mod config;
pub mod global;
pub mod logging;
pub mod session;

pub use config::{ConfigError, DEFAULT_DICTIONARY_VAR, DEFAULT_REPORTER_VAR, HandleConfig};
pub use session::{EnvBootstrap, FatalError, Session, SessionBootstrap};
