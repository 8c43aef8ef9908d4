//! 句柄配置：协调器经环境变量把两个已打开的描述符交给预处理进程。
//!
//! # 设计背景（Why）
//! - 协调器在拉起编译器前建立上报连接并打开字典文件，两者都以描述符编号写入环境变量；
//! - 宿主无法校验描述符的来历，只能保证编号合法且为正数，其余由后续加载步骤暴露。
//!
//! # 契约说明（What）
//! - 变量名默认为 [`DEFAULT_REPORTER_VAR`] 与 [`DEFAULT_DICTIONARY_VAR`]，可逐项覆盖；
//! - 数值沿用 C `strtol(…, 0)` 的书写习惯：十进制、`0x`/`0X` 十六进制、前导 `0` 八进制，
//!   允许首尾空白与正负号；
//! - 与 `strtol` 不同，数字之后的残余字符视为非法，而不是静默截断。

use std::os::fd::RawFd;

use thiserror::Error;

/// 上报套接字描述符的默认环境变量名。
pub const DEFAULT_REPORTER_VAR: &str = "tup_m";
/// 字典描述符的默认环境变量名。
pub const DEFAULT_DICTIONARY_VAR: &str = "tup_vardict";

/// 配置错误码。
pub mod codes {
    /// 环境变量缺失。
    pub const CONFIG_MISSING: &str = "vardict.config.missing";
    /// 环境变量不是合法整数。
    pub const CONFIG_INVALID: &str = "vardict.config.invalid";
    /// 描述符编号不为正。
    pub const CONFIG_NON_POSITIVE: &str = "vardict.config.non_positive";
}

/// 句柄解析失败。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// 变量未设置。
    #[error("environment variable `{var}` is not set")]
    Missing {
        /// 变量名。
        var: String,
    },
    /// 变量值无法解析为描述符编号。
    #[error("environment variable `{var}` holds `{value}`, which is not a descriptor number")]
    Invalid {
        /// 变量名。
        var: String,
        /// 原始取值。
        value: String,
    },
    /// 描述符编号小于等于零。
    #[error("environment variable `{var}` holds non-positive descriptor {fd}")]
    NonPositive {
        /// 变量名。
        var: String,
        /// 解析出的编号。
        fd: i64,
    },
}

impl ConfigError {
    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Missing { .. } => codes::CONFIG_MISSING,
            ConfigError::Invalid { .. } => codes::CONFIG_INVALID,
            ConfigError::NonPositive { .. } => codes::CONFIG_NON_POSITIVE,
        }
    }
}

/// 两个外部句柄所在的环境变量名。
///
/// # 教案式注释
/// - **意图（Why）**：把“从哪里读句柄”与“如何使用句柄”分开，测试可注入任意查表函数，
///   而不必改动进程环境；
/// - **逻辑（How）**：`reporter_fd` 与 `dictionary_fd` 都走同一套查表与解析流程；
/// - **契约（What）**：成功返回的编号一定为正且落在 `RawFd` 范围内。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandleConfig {
    reporter_var: String,
    dictionary_var: String,
}

impl Default for HandleConfig {
    fn default() -> Self {
        Self {
            reporter_var: DEFAULT_REPORTER_VAR.to_owned(),
            dictionary_var: DEFAULT_DICTIONARY_VAR.to_owned(),
        }
    }
}

impl HandleConfig {
    /// 覆盖上报套接字变量名。
    pub fn with_reporter_var(mut self, var: impl Into<String>) -> Self {
        self.reporter_var = var.into();
        self
    }

    /// 覆盖字典变量名。
    pub fn with_dictionary_var(mut self, var: impl Into<String>) -> Self {
        self.dictionary_var = var.into();
        self
    }

    /// 上报套接字变量名。
    pub fn reporter_var(&self) -> &str {
        &self.reporter_var
    }

    /// 字典变量名。
    pub fn dictionary_var(&self) -> &str {
        &self.dictionary_var
    }

    /// 经查表函数解析上报套接字描述符。
    pub fn reporter_fd<F>(&self, lookup: F) -> Result<RawFd, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        resolve_handle(&self.reporter_var, lookup)
    }

    /// 经查表函数解析字典描述符。
    pub fn dictionary_fd<F>(&self, lookup: F) -> Result<RawFd, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        resolve_handle(&self.dictionary_var, lookup)
    }
}

/// 从进程环境读取变量；非 UTF-8 的取值按原样有损转换，交由解析阶段报告为非法。
pub fn process_env(var: &str) -> Option<String> {
    std::env::var_os(var).map(|value| value.to_string_lossy().into_owned())
}

fn resolve_handle<F>(var: &str, lookup: F) -> Result<RawFd, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(var).ok_or_else(|| ConfigError::Missing {
        var: var.to_owned(),
    })?;
    let invalid = || ConfigError::Invalid {
        var: var.to_owned(),
        value: value.clone(),
    };
    let fd = parse_handle(&value).ok_or_else(invalid)?;
    if fd <= 0 {
        return Err(ConfigError::NonPositive {
            var: var.to_owned(),
            fd,
        });
    }
    RawFd::try_from(fd).map_err(|_| invalid())
}

/// 按 `strtol(…, 0)` 规则解析整数，残余字符或溢出返回 `None`。
///
/// # 执行步骤（How）
/// 1. 跳过前导空白，读取可选符号；
/// 2. `0x`/`0X` 且其后紧跟十六进制数字时按 16 进制，否则前导 `0` 按 8 进制，其余按 10 进制；
/// 3. 至少消费一位数字，之后只允许空白。
pub fn parse_handle(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_matches(is_c_space);
    let (negative, unsigned) = match trimmed.as_bytes() {
        [b'-', rest @ ..] => (true, rest),
        [b'+', rest @ ..] => (false, rest),
        rest => (false, rest),
    };
    let (radix, digits) = match unsigned {
        [b'0', b'x' | b'X', first, ..] if first.is_ascii_hexdigit() => (16, &unsigned[2..]),
        [b'0', rest @ ..] if !rest.is_empty() => (8, rest),
        _ => (10, unsigned),
    };
    if digits.is_empty() {
        return None;
    }

    let mut magnitude: i64 = 0;
    for &byte in digits {
        let digit = char::from(byte).to_digit(radix)?;
        magnitude = magnitude
            .checked_mul(i64::from(radix))?
            .checked_add(i64::from(digit))?;
    }
    Some(if negative { -magnitude } else { magnitude })
}

fn is_c_space(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n' | '\x0b' | '\x0c' | '\r')
}
