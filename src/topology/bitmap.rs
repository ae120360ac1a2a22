//! Kernel bitmap-list parsing
//!
//! sysfs encodes sets of CPUs and nodes as comma-separated singles and
//! inclusive ranges, e.g. `0-3,8,10-11`.

use crate::error::{IpcBenchError, Result};
use std::collections::BTreeSet;

/// Parse a bitmap list into an ordered set.
///
/// An empty string (or one holding only whitespace) yields an empty set.
/// An inverted range such as `5-3` contributes nothing.
pub fn parse(list: &str) -> Result<BTreeSet<usize>> {
    let mut items = BTreeSet::new();

    for token in list.trim().split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }

        let parts: Vec<&str> = token.split('-').collect();
        match parts.as_slice() {
            [single] => {
                items.insert(parse_item(list, single)?);
            }
            [start, end] => {
                let start = parse_item(list, start)?;
                let end = parse_item(list, end)?;
                items.extend(start..=end);
            }
            _ => {
                return Err(IpcBenchError::malformed_list(
                    list,
                    format!("'{}' splits into {} parts on '-'", token, parts.len()),
                ));
            }
        }
    }

    Ok(items)
}

fn parse_item(list: &str, part: &str) -> Result<usize> {
    part.trim().parse::<usize>().map_err(|e| {
        IpcBenchError::malformed_list(list, format!("'{}' is not a non-negative integer: {}", part, e))
    })
}

/// Format a set back into compact bitmap-list form (`{0,1,2,5}` -> `"0-2,5"`).
pub fn format<'a>(items: impl IntoIterator<Item = &'a usize>) -> String {
    let mut sorted: Vec<usize> = items.into_iter().copied().collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for item in sorted {
        match ranges.last_mut() {
            Some((_, end)) if *end + 1 == item => *end = item,
            _ => ranges.push((item, item)),
        }
    }

    ranges
        .iter()
        .map(|&(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{}-{}", start, end)
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn set(items: &[usize]) -> BTreeSet<usize> {
        items.iter().copied().collect()
    }

    #[test]
    fn test_parse_ranges_and_singles() {
        assert_eq!(parse("0-3,5").unwrap(), set(&[0, 1, 2, 3, 5]));
        assert_eq!(parse("7").unwrap(), set(&[7]));
        assert_eq!(parse("0-5,1-6").unwrap(), set(&[0, 1, 2, 3, 4, 5, 6]));
        assert_eq!(parse("2,3,1").unwrap(), set(&[1, 2, 3]));
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_sysfs_newline() {
        assert_eq!(parse("0,4\n").unwrap(), set(&[0, 4]));
    }

    #[test]
    fn test_inverted_range_is_empty() {
        assert!(parse("5-3").unwrap().is_empty());
        assert_eq!(parse("5-3,8").unwrap(), set(&[8]));
    }

    #[test]
    fn test_too_many_parts_is_error() {
        let err = parse("1-2-3").unwrap_err();
        assert!(matches!(err, IpcBenchError::MalformedBitmapList { .. }));
    }

    #[test]
    fn test_garbage_is_error() {
        assert!(parse("foo").is_err());
        assert!(parse("1-foo").is_err());
        assert!(parse("-1").is_err());
        assert!(parse("1-").is_err());
    }

    #[test]
    fn test_format() {
        assert_eq!(format(&set(&[0, 1, 2, 3, 5])), "0-3,5");
        assert_eq!(format(&set(&[7])), "7");
        assert_eq!(format(&set(&[])), "");
        assert_eq!(format(&[4, 0, 1, 4]), "0-1,4");
    }

    proptest! {
        #[test]
        fn prop_format_then_parse_keeps_set(items in prop::collection::btree_set(0usize..512, 0..64)) {
            let text = format(&items);
            prop_assert_eq!(parse(&text).unwrap(), items);
        }
    }
}
