//! 把解析结果渲染为宏定义。
//!
//! 宿主预处理器直接构造令牌；这里给出等价的文本形式，供不持有令牌模型的调用方
//! （生成头文件、调试输出）使用，两者的展开语义保持一致。
//! 宏体按字节保存，[`MacroDefinition::write_to`] 逐字节写出；`Display` 仅用于日志，
//! 非 UTF-8 字节以替换字符显示。
//!
//! | 解析结果 | 宏定义 |
//! |---|---|
//! | `StringLiteral("bar")` | `#define NAME "bar"` |
//! | `NumericLiteral("0x10")` | `#define NAME 0x10` |
//! | `Boolean(true)` | `#define NAME 1` |
//! | `PassThrough` | `#define NAME(...) __VA_ARGS__` |
//! | `Suppressed` | `#define NAME(...)` |
//! | `Undefined` | 不定义 |

use std::fmt;
use std::io;

use crate::resolver::ResolvedVariable;

/// 宏体。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MacroBody {
    /// 对象式宏，展开为单个数值令牌。
    Number(Vec<u8>),
    /// 对象式宏，展开为单个字符串令牌（字节已含双引号）。
    String(Vec<u8>),
    /// 函数式变参宏，展开为全部实参。
    VariadicPassThrough,
    /// 函数式变参宏，展开为空。
    VariadicEmpty,
}

impl MacroBody {
    /// 是否为函数式宏。
    pub fn is_function_like(&self) -> bool {
        matches!(self, MacroBody::VariadicPassThrough | MacroBody::VariadicEmpty)
    }
}

/// 一条完整的宏定义。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MacroDefinition {
    name: String,
    body: MacroBody,
}

impl MacroDefinition {
    /// 由解析结果构造；`Undefined` 返回 `None`。
    ///
    /// 字符串值按原样包裹双引号，不做转义；构建变量中出现的引号与反斜杠会原样进入令牌。
    pub fn from_resolved(name: impl Into<String>, resolved: &ResolvedVariable) -> Option<Self> {
        let body = match resolved {
            ResolvedVariable::StringLiteral(raw) => {
                let mut quoted = Vec::with_capacity(raw.len() + 2);
                quoted.push(b'"');
                quoted.extend_from_slice(raw);
                quoted.push(b'"');
                MacroBody::String(quoted)
            }
            ResolvedVariable::NumericLiteral(raw) => MacroBody::Number(raw.clone()),
            ResolvedVariable::Boolean(value) => MacroBody::Number(vec![b'0' + u8::from(*value)]),
            ResolvedVariable::PassThrough => MacroBody::VariadicPassThrough,
            ResolvedVariable::Suppressed => MacroBody::VariadicEmpty,
            ResolvedVariable::Undefined => return None,
        };
        Some(Self {
            name: name.into(),
            body,
        })
    }

    /// 宏名。
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 宏体。
    pub fn body(&self) -> &MacroBody {
        &self.body
    }

    /// 替换列表字节（不含宏名与形参）。
    pub fn expansion(&self) -> &[u8] {
        match &self.body {
            MacroBody::Number(raw) | MacroBody::String(raw) => raw,
            MacroBody::VariadicPassThrough => b"__VA_ARGS__",
            MacroBody::VariadicEmpty => b"",
        }
    }

    /// 逐字节写出 `#define` 行（不含换行）。
    pub fn write_to<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(b"#define ")?;
        out.write_all(self.name.as_bytes())?;
        if self.body.is_function_like() {
            out.write_all(b"(...)")?;
        }
        let expansion = self.expansion();
        if !expansion.is_empty() {
            out.write_all(b" ")?;
            out.write_all(expansion)?;
        }
        Ok(())
    }

    /// `#define` 行的字节形式。
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut line = Vec::with_capacity(self.name.len() + self.expansion().len() + 16);
        // 写入 Vec 不会失败。
        let _ = self.write_to(&mut line);
        line
    }
}

impl fmt::Display for MacroDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.to_bytes()))
    }
}
