//! 变量值分类：把字典中的原始字符串映射为宏层可直接使用的解析结果。
//!
//! # 三种宏风格（What）
//! - **值宏**（`CONFIG_` 风格）：`y` → `1`；`n` → `0` 或不定义；数字与 `0x` 十六进制原样作为数值；
//!   其余作为字符串；
//! - **开关宏**（`ENABLE_` 风格）：恒定义为 `1`/`0`；
//! - **条件宏**（`IF_`/`IF_NOT_` 风格）：函数式变参宏，要么原样展开参数，要么展开为空。
//!
//! 哪个前缀对应哪种风格由宿主的指令层决定，本模块只负责分类。

use crate::dictionary::Dictionary;
use crate::event::AccessSink;

const YES: &[u8] = b"y";

/// 一次解析的结果。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolvedVariable {
    /// 需以双引号包裹后作为字符串字面量；保留字典中的原始字节。
    StringLiteral(Vec<u8>),
    /// 原样作为数值字面量。
    NumericLiteral(Vec<u8>),
    /// 开关值，`true` 渲染为 `1`。
    Boolean(bool),
    /// 条件宏：定义为原样展开变参。
    PassThrough,
    /// 条件宏：定义为空展开。
    Suppressed,
    /// 不应产生任何绑定。
    Undefined,
}

impl ResolvedVariable {
    /// `Boolean` 的数值位；其它变体返回 `None`。
    pub fn bit(&self) -> Option<u8> {
        match self {
            ResolvedVariable::Boolean(value) => Some(u8::from(*value)),
            _ => None,
        }
    }

    /// 宿主是否需要为该结果安装宏定义。
    pub fn is_defined(&self) -> bool {
        !matches!(self, ResolvedVariable::Undefined)
    }
}

/// 值宏分类。
///
/// # 教案式注释
/// - **契约 (What)**：
///   - `None`（未命中或哨兵）→ `Undefined`；
///   - `"y"` → `NumericLiteral("1")`；
///   - `"n"` → `n_is_zero` 时为 `NumericLiteral("0")`，否则 `Undefined`；
///   - 十进制数字串，或 `0x`/`0X` 之后至少一位十六进制数字 → `NumericLiteral(raw)`；
///   - 其余（包括空串与孤立的 `0x`）→ `StringLiteral(raw)`；
/// - **风险 (Trade-offs)**：不识别负号、`0b` 等其它进制前缀与数值后缀，`-1`、`10u`
///   会被当作字符串。
pub fn resolve_value(raw: Option<&[u8]>, n_is_zero: bool) -> ResolvedVariable {
    let Some(raw) = raw else {
        return ResolvedVariable::Undefined;
    };
    match raw {
        b"y" => ResolvedVariable::NumericLiteral(b"1".to_vec()),
        b"n" if n_is_zero => ResolvedVariable::NumericLiteral(b"0".to_vec()),
        b"n" => ResolvedVariable::Undefined,
        _ if is_numeric(raw) => ResolvedVariable::NumericLiteral(raw.to_vec()),
        _ => ResolvedVariable::StringLiteral(raw.to_vec()),
    }
}

/// 开关宏分类：仅 `"y"` 为真，未命中按假处理。
pub fn resolve_boolean(raw: Option<&[u8]>) -> ResolvedVariable {
    ResolvedVariable::Boolean(raw == Some(YES))
}

/// 条件宏分类：`(raw == "y") XOR invert` 为真时透传。
pub fn resolve_conditional(raw: Option<&[u8]>, invert: bool) -> ResolvedVariable {
    if (raw == Some(YES)) ^ invert {
        ResolvedVariable::PassThrough
    } else {
        ResolvedVariable::Suppressed
    }
}

fn is_numeric(raw: &[u8]) -> bool {
    if raw.is_empty() {
        return false;
    }
    match raw {
        [b'0', b'x' | b'X', digits @ ..] if !digits.is_empty() => {
            digits.iter().all(u8::is_ascii_hexdigit)
        }
        _ => raw.iter().all(u8::is_ascii_digit),
    }
}

/// 绑定字典与事件接收端的解析器，对应宿主宏层的三个入口。
///
/// 每次调用都会走一遍 [`Dictionary::lookup`]，命中即上报事件。
#[derive(Clone, Copy)]
pub struct VariableResolver<'a> {
    dictionary: &'a Dictionary,
    sink: &'a dyn AccessSink,
}

impl<'a> VariableResolver<'a> {
    /// 组合字典与接收端。
    pub fn new(dictionary: &'a Dictionary, sink: &'a dyn AccessSink) -> Self {
        Self { dictionary, sink }
    }

    /// 值宏入口。
    pub fn set_variable_macro(&self, name: &[u8], n_is_zero: bool) -> ResolvedVariable {
        resolve_value(self.dictionary.lookup(name, self.sink).value(), n_is_zero)
    }

    /// 开关宏入口。
    pub fn set_boolean_macro(&self, name: &[u8]) -> ResolvedVariable {
        resolve_boolean(self.dictionary.lookup(name, self.sink).value())
    }

    /// 条件宏入口。
    pub fn set_conditional_macro(&self, name: &[u8], invert: bool) -> ResolvedVariable {
        resolve_conditional(self.dictionary.lookup(name, self.sink).value(), invert)
    }
}

impl std::fmt::Debug for VariableResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariableResolver")
            .field("entries", &self.dictionary.len())
            .finish_non_exhaustive()
    }
}
