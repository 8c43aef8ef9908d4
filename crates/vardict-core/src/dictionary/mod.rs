//! 只读变量字典：加载、校验与查找。
//!
//! # 格式（What）
//! ```text
//! entry_count: u32                      （生产者本机字节序）
//! offsets:     [u32] x entry_count      （相对 entries 起点，按键的字典序排列）
//! entries:     "key=value\0" 记录依次拼接
//! ```
//!
//! # 设计要点（How）
//! - 描述符路径通过复制描述符再 `mmap`，宿主交来的原始描述符始终保持打开；
//! - 测试与工具链可用 [`Dictionary::from_bytes`] 直接从内存构建，校验逻辑完全一致；
//! - 查找算法位于 `search` 子模块，记录读取全部经过边界检查，越界字节一律视为 NUL。

mod builder;
mod search;

use std::fs::File;
use std::ops::Deref;
use std::os::fd::BorrowedFd;

use memmap2::Mmap;
use tracing::{debug, warn};

use crate::UNSET_SENTINEL;
use crate::error::{DictionaryError, codes};
use crate::event::AccessSink;

pub use builder::DictionaryBuilder;
use search::SearchOutcome;

/// 条目数头部的字节长度。
pub const DICTIONARY_HEADER_LEN: usize = size_of::<u32>();

const OFFSET_LEN: usize = size_of::<u32>();

/// 字典底层字节的持有方式。
#[derive(Debug)]
enum Storage {
    Mapped(Mmap),
    Owned(Box<[u8]>),
}

impl Deref for Storage {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Storage::Mapped(map) => map,
            Storage::Owned(bytes) => bytes,
        }
    }
}

/// 已校验的只读变量字典。
///
/// # 教案式注释
/// - **意图 (Why)**：进程生命周期内只加载一次，之后被任意多次、任意线程并发查找；
/// - **契约 (What)**：
///   - 构造成功即保证 `len >= 4 + 4 * entry_count`；
///   - 单个偏移的合法性在查找时逐次校验，越界偏移只让该次查找返回未命中；
///   - 结构体不可变，`Send + Sync`；
/// - **风险 (Trade-offs)**：映射期间若生产者截断底层文件，访问映射页会触发 `SIGBUS`；
///   协调器保证字典文件在构建会话中不被修改。
#[derive(Debug)]
pub struct Dictionary {
    storage: Storage,
    entry_count: u32,
}

/// 查找结果。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LookupResult<'a> {
    /// 命中且值不是哨兵。
    Found(&'a [u8]),
    /// 表中不存在，或值为 `~UNSET~`。
    Absent,
}

impl<'a> LookupResult<'a> {
    /// 命中时返回原始值字节。
    pub fn value(&self) -> Option<&'a [u8]> {
        match self {
            LookupResult::Found(value) => Some(value),
            LookupResult::Absent => None,
        }
    }

    /// 是否命中。
    pub fn is_found(&self) -> bool {
        matches!(self, LookupResult::Found(_))
    }
}

/// 一条 `key=value` 记录的视图，生命周期与字典绑定。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Record<'a> {
    /// 记录中的键。
    pub key: &'a [u8],
    /// `=` 之后直到 NUL 的原始值，可能是 `~UNSET~`。
    pub value: &'a [u8],
}

impl Record<'_> {
    /// 值是否为显式未设置的哨兵。
    pub fn is_unset(&self) -> bool {
        self.value == UNSET_SENTINEL
    }
}

impl Dictionary {
    /// 从内存字节构建字典，执行与描述符路径相同的校验。
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self, DictionaryError> {
        let storage = Storage::Owned(bytes.into().into_boxed_slice());
        Self::validate(storage)
    }

    /// 以只读私有映射加载已打开的字典文件。
    ///
    /// # 执行步骤（How）
    /// 1. 读取文件长度，不足 4 字节直接返回 `TooShort`，避免映射空文件；
    /// 2. 建立只读映射；
    /// 3. 读取条目数并校验索引区长度。
    pub fn open(file: &File) -> Result<Self, DictionaryError> {
        let len = file
            .metadata()
            .map_err(|err| DictionaryError::io("fstat", err))?
            .len();
        let len = usize::try_from(len).unwrap_or(usize::MAX);
        if len < DICTIONARY_HEADER_LEN {
            return Err(DictionaryError::TooShort {
                expected: DICTIONARY_HEADER_LEN,
                actual: len,
            });
        }

        // SAFETY: 字典文件由协调器生成且在整个构建会话内只读不变，
        // 映射期间不会被截断或改写。
        #[allow(unsafe_code)]
        let map = unsafe { Mmap::map(file) }.map_err(|err| DictionaryError::io("mmap", err))?;
        Self::validate(Storage::Mapped(map))
    }

    /// 通过宿主交来的描述符加载字典。
    ///
    /// 描述符会被复制一份用于映射，原描述符的所有权仍归调用方。
    pub fn from_fd(fd: BorrowedFd<'_>) -> Result<Self, DictionaryError> {
        let owned = fd
            .try_clone_to_owned()
            .map_err(|err| DictionaryError::io("dup", err))?;
        Self::open(&File::from(owned))
    }

    fn validate(storage: Storage) -> Result<Self, DictionaryError> {
        let actual = storage.len();
        let Some(entry_count) = read_u32(&storage, 0) else {
            return Err(DictionaryError::TooShort {
                expected: DICTIONARY_HEADER_LEN,
                actual,
            });
        };
        let expected = (entry_count as usize)
            .checked_mul(OFFSET_LEN)
            .and_then(|index| index.checked_add(DICTIONARY_HEADER_LEN))
            .unwrap_or(usize::MAX);
        if actual < expected {
            return Err(DictionaryError::IndexTruncated { expected, actual });
        }
        debug!(entries = entry_count, bytes = actual, "vardict dictionary loaded");
        Ok(Self {
            storage,
            entry_count,
        })
    }

    /// 条目数。
    pub fn len(&self) -> usize {
        self.entry_count as usize
    }

    /// 是否为空表。
    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }

    /// 字典文件的总字节数。
    pub fn byte_len(&self) -> usize {
        self.storage.len()
    }

    /// 查找键并上报访问事件。
    ///
    /// # 教案式注释
    /// - **意图 (Why)**：命中即意味着输出依赖该变量，即便值为 `~UNSET~` 也必须让协调器感知；
    /// - **契约 (What)**：
    ///   - 命中：先调用 `sink.report(key)`，再按哨兵规则返回 `Found`/`Absent`；
    ///   - 未命中或遇到越界偏移：返回 `Absent`，不上报；
    ///   - 上报失败只记录 `warn` 日志，不影响返回值；
    /// - **风险 (Trade-offs)**：每次命中都会同步写一次连接，热点变量会产生重复事件，
    ///   去重由协调器负责。
    pub fn lookup(&self, key: &[u8], sink: &dyn AccessSink) -> LookupResult<'_> {
        let Some(record) = self.search(key) else {
            debug!(key = %String::from_utf8_lossy(key), found = false, "vardict lookup");
            return LookupResult::Absent;
        };
        debug!(
            key = %String::from_utf8_lossy(key),
            found = true,
            unset = record.is_unset(),
            "vardict lookup"
        );
        if let Err(err) = sink.report(record.key) {
            warn!(
                key = %String::from_utf8_lossy(record.key),
                code = err.code(),
                error = %err,
                "vardict access event dropped"
            );
        }
        if record.is_unset() {
            LookupResult::Absent
        } else {
            LookupResult::Found(record.value)
        }
    }

    /// 纯查找，不上报事件，也不处理哨兵。
    pub fn search(&self, key: &[u8]) -> Option<Record<'_>> {
        match search::binary_search(self, key) {
            SearchOutcome::Hit(record) => Some(record),
            SearchOutcome::Miss => None,
            SearchOutcome::Corrupted { slot, offset } => {
                warn!(
                    slot,
                    offset,
                    file_len = self.byte_len(),
                    code = codes::DICTIONARY_CORRUPTED,
                    "vardict offset for element is out of bounds"
                );
                None
            }
        }
    }

    /// 按表内顺序遍历全部可解析的记录，越界偏移与缺少 `=` 的记录被跳过。
    pub fn entries(&self) -> impl Iterator<Item = Record<'_>> + '_ {
        (0..self.len()).filter_map(move |slot| {
            let offset = self.offset(slot)?;
            if offset as usize >= self.byte_len() {
                return None;
            }
            let record = self.record_at(offset as usize);
            let sep = record.iter().position(|byte| *byte == b'=')?;
            Some(Record {
                key: &record[..sep],
                value: &record[sep + 1..],
            })
        })
    }

    /// 第 `slot` 个偏移；索引区已在构造时校验，`None` 只在 `slot` 越过条目数时出现。
    fn offset(&self, slot: usize) -> Option<u32> {
        if slot >= self.len() {
            return None;
        }
        read_u32(&self.storage, DICTIONARY_HEADER_LEN + slot * OFFSET_LEN)
    }

    /// 记录区（索引之后的全部字节）。
    fn entries_region(&self) -> &[u8] {
        let start = DICTIONARY_HEADER_LEN + self.len() * OFFSET_LEN;
        self.storage.get(start..).unwrap_or_default()
    }

    /// 从记录区 `start` 处截取到 NUL（或区尾）为止的字节。
    fn record_at(&self, start: usize) -> &[u8] {
        let region = self.entries_region();
        let tail = region.get(start..).unwrap_or_default();
        let end = tail.iter().position(|byte| *byte == 0).unwrap_or(tail.len());
        &tail[..end]
    }
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let raw = bytes.get(at..at.checked_add(size_of::<u32>())?)?;
    Some(u32::from_ne_bytes(raw.try_into().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_stubs::RecordingSink;

    fn sample() -> Dictionary {
        DictionaryBuilder::new()
            .set("FOO", "bar")
            .set("BAZ", "y")
            .unset("QUX")
            .build()
            .expect("build sample dictionary")
    }

    #[test]
    fn rejects_file_shorter_than_header() {
        let err = Dictionary::from_bytes(vec![1u8, 0]).expect_err("two bytes must be rejected");
        assert!(matches!(
            err,
            DictionaryError::TooShort {
                expected: 4,
                actual: 2
            }
        ));
    }

    #[test]
    fn rejects_index_larger_than_file() {
        let mut bytes = 3u32.to_ne_bytes().to_vec();
        bytes.extend_from_slice(&0u32.to_ne_bytes());
        let err = Dictionary::from_bytes(bytes).expect_err("index for 3 entries needs 16 bytes");
        assert!(matches!(
            err,
            DictionaryError::IndexTruncated {
                expected: 16,
                actual: 8
            }
        ));
    }

    #[test]
    fn empty_table_never_reports() {
        let dict = Dictionary::from_bytes(0u32.to_ne_bytes().to_vec()).expect("empty table");
        let sink = RecordingSink::default();
        assert!(dict.is_empty());
        assert_eq!(dict.lookup(b"FOO", &sink), LookupResult::Absent);
        assert!(sink.keys().is_empty());
    }

    #[test]
    fn found_value_is_reported_once() {
        let dict = sample();
        let sink = RecordingSink::default();
        assert_eq!(dict.lookup(b"FOO", &sink), LookupResult::Found(b"bar"));
        assert_eq!(dict.lookup(b"BAZ", &sink), LookupResult::Found(b"y"));
        assert_eq!(sink.keys(), vec![b"FOO".to_vec(), b"BAZ".to_vec()]);
    }

    #[test]
    fn unset_sentinel_is_absent_but_observed() {
        let dict = sample();
        let sink = RecordingSink::default();
        assert_eq!(dict.lookup(b"QUX", &sink), LookupResult::Absent);
        assert_eq!(sink.keys(), vec![b"QUX".to_vec()]);
    }

    #[test]
    fn missing_key_is_not_reported() {
        let dict = sample();
        let sink = RecordingSink::default();
        assert_eq!(dict.lookup(b"MISSING", &sink), LookupResult::Absent);
        assert!(sink.keys().is_empty());
    }

    #[test]
    fn entries_iterate_in_table_order() {
        let dict = sample();
        let keys: Vec<&[u8]> = dict.entries().map(|record| record.key).collect();
        assert_eq!(keys, vec![&b"BAZ"[..], &b"FOO"[..], &b"QUX"[..]]);
        assert!(dict.entries().any(|record| record.is_unset()));
    }
}
