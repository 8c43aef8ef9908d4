//! 以 `=` 为分隔哨兵的二分查找。
//!
//! # 算法契约（What）
//! - 开区间 `(left, right)`，初值 `(-1, entry_count)`；
//! - 每轮取 `cur = left + ((right - left) >> 1)`，半宽为 0 或 `cur` 越过条目数即结束；
//! - 记录字节为 `=`，说明记录键是搜索键的真前缀，按“记录更小”处理；
//! - 搜索键耗尽而记录下一字节不是 `=`，说明记录键更长，按“记录更大”处理；
//! - 字节按无符号八位比较。
//!
//! 这些平局规则决定了与生产者排序结果的兼容性，修改前需同步生产端。

use super::{Dictionary, Record};

/// 单条记录与搜索键的三路比较结果。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum RecordOrder {
    /// 记录键小于搜索键。
    Less,
    /// 记录键大于搜索键。
    Greater,
    /// 完全匹配，值从记录区 `value_start` 处开始。
    Match { value_start: usize },
}

/// 一次二分查找的结局。
#[derive(Debug)]
pub(super) enum SearchOutcome<'a> {
    Hit(Record<'a>),
    Miss,
    /// 第 `slot` 个偏移越过文件长度，查找中止。
    Corrupted { slot: usize, offset: u32 },
}

/// 读取记录区第 `at` 个字节，越界视为 NUL。
fn byte_at(region: &[u8], at: usize) -> u8 {
    region.get(at).copied().unwrap_or(0)
}

/// 比较 `region[start..]` 处的记录与搜索键。
pub(super) fn compare_record(region: &[u8], start: usize, key: &[u8]) -> RecordOrder {
    for (i, &wanted) in key.iter().enumerate() {
        let byte = byte_at(region, start + i);
        // 记录键提前结束。
        if byte == b'=' || byte < wanted {
            return RecordOrder::Less;
        }
        if byte > wanted {
            return RecordOrder::Greater;
        }
    }
    let sep = start + key.len();
    if byte_at(region, sep) == b'=' {
        RecordOrder::Match {
            value_start: sep + 1,
        }
    } else {
        RecordOrder::Greater
    }
}

pub(super) fn binary_search<'a>(dict: &'a Dictionary, key: &[u8]) -> SearchOutcome<'a> {
    let count = dict.len() as i64;
    let region = dict.entries_region();
    let mut left: i64 = -1;
    let mut right: i64 = count;

    loop {
        let half = (right - left) >> 1;
        if half <= 0 {
            return SearchOutcome::Miss;
        }
        let cur = left + half;
        if cur >= count {
            return SearchOutcome::Miss;
        }

        let slot = cur as usize;
        let Some(offset) = dict.offset(slot) else {
            return SearchOutcome::Miss;
        };
        if offset as usize >= dict.byte_len() {
            return SearchOutcome::Corrupted { slot, offset };
        }

        let start = offset as usize;
        match compare_record(region, start, key) {
            RecordOrder::Less => left = cur,
            RecordOrder::Greater => right = cur,
            RecordOrder::Match { value_start } => {
                let tail = region.get(value_start..).unwrap_or_default();
                let end = tail.iter().position(|byte| *byte == 0).unwrap_or(tail.len());
                let key_end = (start + key.len()).min(region.len());
                return SearchOutcome::Hit(Record {
                    key: region.get(start..key_end).unwrap_or_default(),
                    value: &tail[..end],
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separator_sorts_before_any_key_byte() {
        // "AB=1" 对搜索键 "ABC"：第三字节遇到 '='，记录更小。
        assert_eq!(compare_record(b"AB=1\0", 0, b"ABC"), RecordOrder::Less);
    }

    #[test]
    fn longer_record_key_is_greater() {
        assert_eq!(compare_record(b"ABC=1\0", 0, b"AB"), RecordOrder::Greater);
    }

    #[test]
    fn exact_key_matches_after_separator() {
        assert_eq!(
            compare_record(b"xxFOO=bar\0", 2, b"FOO"),
            RecordOrder::Match { value_start: 6 }
        );
    }

    #[test]
    fn bytes_compare_unsigned() {
        // 0xC3 在有符号比较下会小于 'A'，这里必须大于。
        assert_eq!(compare_record(&[0xC3, b'=', b'1', 0], 0, b"A"), RecordOrder::Greater);
    }

    #[test]
    fn reading_past_region_end_sees_nul() {
        // 截断的记录被视为在区尾以 NUL 结束，比较不会越界。
        assert_eq!(compare_record(b"FO", 0, b"FOO"), RecordOrder::Less);
        assert_eq!(compare_record(b"FOO", 0, b"FOO"), RecordOrder::Greater);
    }

    #[test]
    fn corrupted_offset_aborts_search() {
        let mut bytes = 1u32.to_ne_bytes().to_vec();
        bytes.extend_from_slice(&999u32.to_ne_bytes());
        bytes.extend_from_slice(b"FOO=bar\0");
        let dict = Dictionary::from_bytes(bytes).expect("header is well formed");
        assert!(matches!(
            binary_search(&dict, b"FOO"),
            SearchOutcome::Corrupted {
                slot: 0,
                offset: 999
            }
        ));
    }

    #[test]
    fn offset_inside_file_but_past_entries_reads_as_empty_record() {
        // 偏移小于文件长度但越过记录区末尾：记录视为空串，不产生越界读取。
        let mut bytes = 1u32.to_ne_bytes().to_vec();
        bytes.extend_from_slice(&9u32.to_ne_bytes());
        bytes.extend_from_slice(b"FOO=bar\0");
        let dict = Dictionary::from_bytes(bytes).expect("header is well formed");
        assert!(matches!(binary_search(&dict, b"FOO"), SearchOutcome::Miss));
    }
}
