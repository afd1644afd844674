//! Data-driven reference matchers.
//!
//! Each id notation found in sidecar and asset text is one table entry: a
//! compiled regex plus an extraction function. Adding a notation means adding
//! a row, not another scan loop.

use regex::{Captures, Regex};
use std::sync::OnceLock;

use crate::types::AssetId;

pub struct ReferencePattern {
    regex: Regex,
    extract: fn(&Captures) -> Option<AssetId>,
}

fn extract_plain(caps: &Captures) -> Option<AssetId> {
    AssetId::from_hex(&caps[1])
}

fn extract_dashed(caps: &Captures) -> Option<AssetId> {
    AssetId::from_dashed(&caps[1])
}

fn extract_hash128(caps: &Captures) -> Option<AssetId> {
    let x = caps[1].parse::<u32>().ok()?;
    let y = caps[2].parse::<u32>().ok()?;
    let z = caps[3].parse::<u32>().ok()?;
    let w = caps[4].parse::<u32>().ok()?;
    // The all-zero hash is an unset reference, not an id.
    AssetId::from_hash128(x, y, z, w)
}

/// The compiled pattern table, built once on first use.
pub fn reference_patterns() -> &'static [ReferencePattern] {
    static PATTERNS: OnceLock<Vec<ReferencePattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            ReferencePattern {
                regex: Regex::new(r"guid:\s+([a-z0-9]{32})").expect("static pattern"),
                extract: extract_plain,
            },
            ReferencePattern {
                regex: Regex::new(
                    r"guid:\s+([0-9a-z]{8}-[0-9a-z]{4}-[0-9a-z]{4}-[0-9a-z]{4}-[0-9a-z]{12})",
                )
                .expect("static pattern"),
                extract: extract_dashed,
            },
            ReferencePattern {
                regex: Regex::new(
                    r"guid:\s+Value:\s+x:\s*(\d+)\s+y:\s*(\d+)\s+z:\s*(\d+)\s+w:\s*(\d+)",
                )
                .expect("static pattern"),
                extract: extract_hash128,
            },
        ]
    })
}

/// Extract every id referenced in `text`, in pattern-table order.
pub fn extract_ids(text: &str) -> Vec<AssetId> {
    let mut ids = Vec::new();
    for pattern in reference_patterns() {
        for caps in pattern.regex.captures_iter(text) {
            if let Some(id) = (pattern.extract)(&caps) {
                ids.push(id);
            }
        }
    }
    ids
}
