//! 进程级单例与面向宏层的自由函数入口。
//!
//! # 设计背景（Why）
//! - 宿主宏层以普通函数调用解析变量，无处传递会话对象，因此需要一个惰性构造的全局会话；
//! - 装配失败时宿主没有可恢复的路径：终止进程并在 stderr 留下子系统名，交由构建协调器报告。
//!
//! # 契约说明（What）
//! - 全局会话使用默认变量名 `tup_m` / `tup_vardict`；
//! - 每个入口在首次调用时完成初始化，之后直接查表；
//! - 初始化失败调用 [`std::process::abort`]，不会返回。

use std::sync::LazyLock;

use tracing::error;
use vardict_core::ResolvedVariable;

use crate::session::{FatalError, Session};

static SESSION: LazyLock<Session> = LazyLock::new(Session::from_env);

/// 全局会话。
pub fn session() -> &'static Session {
    &SESSION
}

/// 确保全局会话已初始化，失败即终止进程。
pub fn ensure_initialized() {
    or_abort(SESSION.ensure_initialized());
}

/// 值宏入口。
pub fn set_variable_macro(name: &[u8], n_is_zero: bool) -> ResolvedVariable {
    or_abort(SESSION.set_variable_macro(name, n_is_zero))
}

/// 开关宏入口。
pub fn set_boolean_macro(name: &[u8]) -> ResolvedVariable {
    or_abort(SESSION.set_boolean_macro(name))
}

/// 条件宏入口。
pub fn set_conditional_macro(name: &[u8], invert: bool) -> ResolvedVariable {
    or_abort(SESSION.set_conditional_macro(name, invert))
}

fn or_abort<T>(result: Result<T, FatalError>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => abort_with(&err),
    }
}

/// 记录致命错误并终止进程。
pub fn abort_with(err: &FatalError) -> ! {
    error!(
        subsystem = err.subsystem(),
        code = err.code(),
        error = %err,
        "vardict session failed"
    );
    eprintln!("vardict: fatal {} error: {err}", err.subsystem());
    std::process::abort()
}
