//! stderr 日志安装入口。
//!
//! # 教案式说明
//! - **意图（Why）**：预处理进程的 stdout 属于编译产物，诊断只能写 stderr；
//!   默认仅输出 `warn` 及以上，避免淹没编译器自身的告警；
//! - **逻辑（How）**：组装 `EnvFilter + fmt` 两层，过滤指令取自 [`LOG_ENV`]，解析失败回退到 [`DEFAULT_DIRECTIVE`]；
//! - **契约（What）**：重复调用返回 `Ok(())` 且不再安装；若外部已设置全局 Subscriber，
//!   返回 [`LoggingError::SubscriberAlreadySet`]。

use spin::Once;
use thiserror::Error;
use tracing::dispatcher;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, fmt};

/// 读取过滤指令的环境变量。
pub const LOG_ENV: &str = "VARDICT_LOG";
/// 未配置时的默认过滤指令。
pub const DEFAULT_DIRECTIVE: &str = "warn";

static INSTALLED: Once<()> = Once::new();

/// 日志安装失败。
#[derive(Debug, Error)]
pub enum LoggingError {
    /// 宿主或其它库已设置全局 Subscriber。
    #[error("a global tracing subscriber is already installed")]
    SubscriberAlreadySet,
    /// 设置全局 Subscriber 时发生竞争。
    #[error("failed to install global subscriber: {0}")]
    SetGlobalSubscriber(#[from] SetGlobalDefaultError),
}

/// 安装写往 stderr 的全局 Subscriber。
pub fn install_stderr_logging() -> Result<(), LoggingError> {
    if INSTALLED.is_completed() {
        return Ok(());
    }
    INSTALLED.try_call_once(|| {
        if dispatcher::has_been_set() {
            return Err(LoggingError::SubscriberAlreadySet);
        }
        let subscriber = tracing_subscriber::registry()
            .with(build_env_filter())
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false));
        tracing::subscriber::set_global_default(subscriber)?;
        Ok(())
    })?;
    Ok(())
}

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}
