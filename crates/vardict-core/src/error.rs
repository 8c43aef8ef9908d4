//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 为字典加载、事件上报与事件解码三个失败域提供集中定义；
//! - 每个变体都映射到稳定错误码，日志与告警可以按码值聚合，而不依赖自然语言文案。
//!
//! ## 设计要求（What）
//! - 所有错误类型派生 `thiserror::Error`，兼容 `std::error::Error` 与 `?` 传播；
//! - IO 类变体通过 `#[source]` 保留原始 [`std::io::Error`]，排障时可回溯 errno；
//! - 致命与非致命的判定不在此处做：字典错误由宿主会话升级为致命，上报错误只记录日志。

use std::io;

use thiserror::Error;

/// 稳定错误码表，遵循 `vardict.<域>.<语义>` 命名约定。
pub mod codes {
    /// 字典文件连 4 字节的条目数头部都容纳不下。
    pub const DICTIONARY_TOO_SHORT: &str = "vardict.dictionary.too_short";
    /// 字典文件无法容纳条目数声明的偏移索引。
    pub const DICTIONARY_INDEX_TRUNCATED: &str = "vardict.dictionary.index_truncated";
    /// 获取文件元数据、复制描述符或建立映射失败。
    pub const DICTIONARY_IO: &str = "vardict.dictionary.io";
    /// 构建字典时遇到无法编码的记录。
    pub const DICTIONARY_INVALID_RECORD: &str = "vardict.dictionary.invalid_record";
    /// 查找过程中遇到越界偏移，查找中止并按未命中处理。
    pub const DICTIONARY_CORRUPTED: &str = "vardict.dictionary.corrupted";
    /// 事件负载超出单帧上限。
    pub const REPORT_OVERSIZE: &str = "vardict.report.oversize";
    /// 事件写入底层连接失败。
    pub const REPORT_TRANSPORT: &str = "vardict.report.transport";
    /// 事件帧无法按线格式解析。
    pub const EVENT_MALFORMED: &str = "vardict.event.malformed";
}

/// 字典加载阶段的错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：区分“文件本身不合法”（格式错误）与“操作系统拒绝服务”（IO 错误），
///   两者都会让宿主终止，但诊断信息需要指向不同的排障方向；
/// - **契约 (What)**：`expected`/`actual` 均为字节数；`operation` 指明失败的系统操作；
/// - **风险 (Trade-offs)**：未单独区分“条目数溢出平台字长”，该情况并入 `IndexTruncated`。
#[derive(Debug, Error)]
pub enum DictionaryError {
    /// 文件长度小于条目数头部。
    #[error("dictionary should be at least {expected} bytes, but got {actual} bytes")]
    TooShort {
        /// 头部所需的最小字节数。
        expected: usize,
        /// 实际文件长度。
        actual: usize,
    },
    /// 文件长度不足以容纳偏移索引。
    #[error("dictionary should have at least {expected} bytes to accommodate the index, but got {actual} bytes")]
    IndexTruncated {
        /// 头部加索引所需的最小字节数。
        expected: usize,
        /// 实际文件长度。
        actual: usize,
    },
    /// 构建字典时记录无法编码为 `key=value\0`。
    #[error("dictionary record `{key}` is invalid: {reason}")]
    InvalidRecord {
        /// 出问题的键（有损 UTF-8 展示）。
        key: String,
        /// 具体原因。
        reason: &'static str,
    },
    /// 底层系统调用失败。
    #[error("dictionary {operation} failed: {source}")]
    Io {
        /// 失败的操作名，例如 `fstat`、`mmap`。
        operation: &'static str,
        /// 原始 IO 错误。
        #[source]
        source: io::Error,
    },
}

impl DictionaryError {
    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            DictionaryError::TooShort { .. } => codes::DICTIONARY_TOO_SHORT,
            DictionaryError::IndexTruncated { .. } => codes::DICTIONARY_INDEX_TRUNCATED,
            DictionaryError::InvalidRecord { .. } => codes::DICTIONARY_INVALID_RECORD,
            DictionaryError::Io { .. } => codes::DICTIONARY_IO,
        }
    }

    /// 是否属于文件格式问题（而非 IO 问题）。
    pub fn is_format(&self) -> bool {
        !matches!(self, DictionaryError::Io { .. })
    }

    pub(crate) fn io(operation: &'static str, source: io::Error) -> Self {
        DictionaryError::Io { operation, source }
    }
}

/// 依赖事件上报的错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：上报是尽力而为的遥测，调用方需要知道失败原因用于日志，
///   但不会据此改变查找结果；
/// - **契约 (What)**：`Oversize` 在写入前判定，不会产生任何 IO；`Transport`
///   保留底层错误，常见为 `BrokenPipe`（协调器已退出）；
/// - **风险 (Trade-offs)**：不提供重试建议，协调器需把缺失事件视为“依赖未知”。
#[derive(Debug, Error)]
pub enum ReportError {
    /// 负载长度（含结尾 NUL）达到或超过单帧上限。
    #[error("access event payload is too long ({len} bytes, limit {limit})")]
    Oversize {
        /// 负载长度（键长 + 1）。
        len: usize,
        /// 单帧负载上限。
        limit: usize,
    },
    /// 写入连接失败或仅写出部分帧。
    #[error("access event send failed: {source}")]
    Transport {
        /// 原始 IO 错误。
        #[source]
        source: io::Error,
    },
}

impl ReportError {
    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            ReportError::Oversize { .. } => codes::REPORT_OVERSIZE,
            ReportError::Transport { .. } => codes::REPORT_TRANSPORT,
        }
    }
}

/// 协调器侧解析事件帧时的错误。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EventDecodeError {
    /// 帧长度不足以容纳头部或声明的负载。
    #[error("access event frame truncated: need {needed} bytes, got {available}")]
    Truncated {
        /// 完整帧所需字节数。
        needed: usize,
        /// 实际可用字节数。
        available: usize,
    },
    /// 事件类型不是变量访问。
    #[error("unexpected access event kind {0}")]
    UnexpectedKind(u32),
    /// 负载长度为 0 或最后一个字节不是 NUL。
    #[error("access event payload is not NUL-terminated")]
    MissingTerminator,
}

impl EventDecodeError {
    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        codes::EVENT_MALFORMED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_errors_are_distinguished_from_io_errors() {
        let short = DictionaryError::TooShort {
            expected: 4,
            actual: 2,
        };
        assert!(short.is_format());
        assert_eq!(short.code(), codes::DICTIONARY_TOO_SHORT);

        let io = DictionaryError::io("mmap", io::Error::from(io::ErrorKind::InvalidInput));
        assert!(!io.is_format());
        assert_eq!(io.code(), codes::DICTIONARY_IO);
        assert!(io.to_string().starts_with("dictionary mmap failed"));
    }

    #[test]
    fn report_error_keeps_source_chain() {
        use std::error::Error as _;
        let err = ReportError::Transport {
            source: io::Error::from(io::ErrorKind::BrokenPipe),
        };
        assert_eq!(err.code(), codes::REPORT_TRANSPORT);
        assert!(err.source().is_some());
    }
}
