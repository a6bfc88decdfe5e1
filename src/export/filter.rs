//! Chapter access filter: per-chapter skip/fetch decision from purchase
//! status and the operator-supplied ignore specification.

use crate::model::ChapterMeta;

/// Parsed `-i/--ignore` value. Supports empty, a single id, a
/// comma-separated list, or an inclusive numeric range `start-end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreSet {
    Empty,
    Ids(Vec<u64>),
    Range(u64, u64),
}

impl IgnoreSet {
    pub fn contains(&self, id: u64) -> bool {
        match self {
            IgnoreSet::Empty => false,
            IgnoreSet::Ids(ids) => ids.contains(&id),
            IgnoreSet::Range(start, end) => (*start..=*end).contains(&id),
        }
    }
}

/// Parse an ignore specification. Malformed input is a configuration error;
/// the caller (clap value parser) reports it before any browser activity.
pub fn parse_ignore_spec(s: &str) -> Result<IgnoreSet, String> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(IgnoreSet::Empty);
    }
    if let Some((from_str, to_str)) = s.split_once('-') {
        let from: u64 = from_str.trim().parse().map_err(|_| {
            format!(
                "Invalid --ignore range: '{}' is not a valid chapter id",
                from_str.trim()
            )
        })?;
        let to: u64 = to_str.trim().parse().map_err(|_| {
            format!(
                "Invalid --ignore range: '{}' is not a valid chapter id",
                to_str.trim()
            )
        })?;
        if from > to {
            return Err(format!(
                "Invalid --ignore range: start ({}) must be <= end ({})",
                from, to
            ));
        }
        return Ok(IgnoreSet::Range(from, to));
    }
    let ids = s
        .split(',')
        .map(|part| {
            part.trim().parse::<u64>().map_err(|_| {
                format!(
                    "Invalid --ignore: '{}' is not a valid chapter id",
                    part.trim()
                )
            })
        })
        .collect::<Result<Vec<u64>, String>>()?;
    Ok(IgnoreSet::Ids(ids))
}

/// Decision for one catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterAction {
    Fetch,
    /// Not free and not purchased: no page load is spent on it.
    SkipPaid,
    /// Listed in the ignore specification.
    SkipIgnored,
}

/// Paid-skip and ignore-skip are independent filters; the paid check runs
/// first, and either short-circuits without consuming a page load.
pub fn chapter_action(meta: &ChapterMeta, ignore: &IgnoreSet) -> ChapterAction {
    if !meta.is_free && !meta.is_purchased {
        return ChapterAction::SkipPaid;
    }
    if ignore.contains(meta.id) {
        return ChapterAction::SkipIgnored;
    }
    ChapterAction::Fetch
}
