//! 字典生产端：把键值对编码为可映射的有序表。

use std::collections::BTreeMap;

use super::{DICTIONARY_HEADER_LEN, Dictionary, OFFSET_LEN};
use crate::UNSET_SENTINEL;
use crate::error::DictionaryError;

/// 有序字典构建器。
///
/// # 教案式注释
/// - **意图 (Why)**：协调器需要按查找算法约定的顺序写出记录；测试、基准与工具链也需要
///   构造合法字典而不必手写偏移；
/// - **逻辑 (How)**：以 `BTreeMap<Vec<u8>, _>` 做逐字节升序排列。由于键中不允许出现 `=`，
///   “`=` 小于任何键字节”的平局规则与普通字节序等价，排序结果可被查找直接使用；
/// - **契约 (What)**：
///   - 同一键多次写入，以最后一次为准；
///   - 键不能为空，且键值都不能含 NUL，键不能含 `=`，否则 `to_bytes` 返回 `InvalidRecord`；
///   - 输出使用本机字节序；
/// - **风险 (Trade-offs)**：构建在内存中一次完成，不适合远超内存的变量集，但构建变量
///   通常只有数千条。
#[derive(Clone, Debug, Default)]
pub struct DictionaryBuilder {
    records: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl DictionaryBuilder {
    /// 创建空构建器。
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入 `key=value`。
    pub fn set(mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Self {
        self.insert(key, value);
        self
    }

    /// 写入显式未设置的键（值为 `~UNSET~`）。
    pub fn unset(self, key: impl AsRef<[u8]>) -> Self {
        self.set(key, UNSET_SENTINEL)
    }

    /// 以可变引用形式写入，便于在循环中使用。
    pub fn insert(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> &mut Self {
        self.records
            .insert(key.as_ref().to_vec(), value.as_ref().to_vec());
        self
    }

    /// 当前记录数。
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// 是否尚无记录。
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 编码为字典文件字节。
    pub fn to_bytes(&self) -> Result<Vec<u8>, DictionaryError> {
        let count = u32::try_from(self.records.len()).map_err(|_| DictionaryError::InvalidRecord {
            key: String::new(),
            reason: "entry count exceeds u32",
        })?;

        let mut entries = Vec::new();
        let mut offsets = Vec::with_capacity(self.records.len());
        for (key, value) in &self.records {
            validate_record(key, value)?;
            let offset = u32::try_from(entries.len()).map_err(|_| invalid(key, "offset exceeds u32"))?;
            offsets.push(offset);
            entries.extend_from_slice(key);
            entries.push(b'=');
            entries.extend_from_slice(value);
            entries.push(0);
        }

        let mut out =
            Vec::with_capacity(DICTIONARY_HEADER_LEN + offsets.len() * OFFSET_LEN + entries.len());
        out.extend_from_slice(&count.to_ne_bytes());
        for offset in offsets {
            out.extend_from_slice(&offset.to_ne_bytes());
        }
        out.extend_from_slice(&entries);
        Ok(out)
    }

    /// 编码并直接加载为内存字典。
    pub fn build(&self) -> Result<Dictionary, DictionaryError> {
        Dictionary::from_bytes(self.to_bytes()?)
    }
}

fn validate_record(key: &[u8], value: &[u8]) -> Result<(), DictionaryError> {
    if key.is_empty() {
        return Err(invalid(key, "key is empty"));
    }
    if key.iter().any(|byte| *byte == b'=' || *byte == 0) {
        return Err(invalid(key, "key contains '=' or NUL"));
    }
    if value.contains(&0) {
        return Err(invalid(key, "value contains NUL"));
    }
    Ok(())
}

fn invalid(key: &[u8], reason: &'static str) -> DictionaryError {
    DictionaryError::InvalidRecord {
        key: String::from_utf8_lossy(key).into_owned(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_wire_format() {
        let bytes = DictionaryBuilder::new()
            .set("FOO", "bar")
            .set("BAZ", "y")
            .to_bytes()
            .expect("encode");

        let mut expected = 2u32.to_ne_bytes().to_vec();
        expected.extend_from_slice(&0u32.to_ne_bytes());
        expected.extend_from_slice(&6u32.to_ne_bytes());
        expected.extend_from_slice(b"BAZ=y\0FOO=bar\0");
        assert_eq!(bytes, expected);
    }

    #[test]
    fn last_write_wins() {
        let dict = DictionaryBuilder::new()
            .set("FOO", "1")
            .set("FOO", "2")
            .build()
            .expect("build");
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.search(b"FOO").map(|record| record.value), Some(&b"2"[..]));
    }

    #[test]
    fn rejects_separator_inside_key() {
        let err = DictionaryBuilder::new()
            .set("A=B", "1")
            .to_bytes()
            .expect_err("key with '=' cannot be encoded");
        assert!(matches!(err, DictionaryError::InvalidRecord { .. }));
    }

    #[test]
    fn rejects_nul_inside_value() {
        let err = DictionaryBuilder::new()
            .set("A", b"x\0y")
            .to_bytes()
            .expect_err("value with NUL cannot be encoded");
        assert!(err.to_string().contains("value contains NUL"));
    }
}
