#![deny(unsafe_code)]
#![warn(missing_docs)]

//! `vardict-core`：构建变量字典的格式、查找与依赖事件契约。
//!
//! # 设计动机（Why）
//! - 预处理器在遇到 `CONFIG_FOO` 一类宏时需要把构建变量 `FOO` 解析为字面值；
//!   变量表由构建协调器预先生成，以只读映射的方式交给预处理进程。
//! - 每一次命中的查找都意味着“输出依赖于该变量”，需要把访问事件回报给协调器，
//!   以便变量变化时精确地让下游产物失效。
//!
//! # 模块划分（How）
//! - [`dictionary`]：有序 `key=value` 表的加载、校验与以 `=` 为分隔哨兵的二分查找；
//! - [`event`]：依赖事件的线格式编解码与 [`AccessSink`] 上报接缝；
//! - [`resolver`]：把原始字符串分类为字符串/数值/布尔/变参透传等解析结果；
//! - [`render`]：将解析结果渲染为宿主可安装的宏定义文本；
//! - [`error`]：各失败域的 `thiserror` 枚举与稳定错误码。
//!
//! # 契约说明（What）
//! - 查找路径只读、无锁，可被多线程并发调用；
//! - 事件上报是尽力而为的旁路遥测，失败只记录日志，绝不改变解析结果；
//! - 本 crate 不创建任何套接字，也不读取环境变量，这些职责由 `vardict-transport`
//!   与 `vardict-hosting` 承担。
//!
//! # 风险提示（Trade-offs）
//! - 字典采用生产者的本机字节序，跨架构拷贝字典文件将得到错误的条目数，
//!   校验会把这类文件识别为格式错误而非静默误读。

pub mod dictionary;
pub mod error;
pub mod event;
pub mod render;
pub mod resolver;
/// 测试桩命名空间，集中提供记录型与故障注入型的 [`AccessSink`] 实现。
///
/// # 使用方式（How）
/// - 通过 `use vardict_core::test_stubs::{RecordingSink, FailingSink};` 引入；
/// - 下游 crate 的集成测试直接复用，避免各自重复定义同构桩对象。
pub mod test_stubs;

pub use dictionary::{DICTIONARY_HEADER_LEN, Dictionary, DictionaryBuilder, LookupResult, Record};
pub use error::{DictionaryError, EventDecodeError, ReportError};
pub use event::{ACCESS_VAR, AccessEvent, AccessSink, MAX_FRAME_PAYLOAD, NoopSink};
pub use render::{MacroBody, MacroDefinition};
pub use resolver::{ResolvedVariable, VariableResolver};

/// 字典中表示“存在但显式无值”的哨兵。
pub const UNSET_SENTINEL: &[u8] = b"~UNSET~";
