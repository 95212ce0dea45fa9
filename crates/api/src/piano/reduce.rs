//! Reduction of the raw Piano `getData` response into deduplicated
//! variation rows.
//!
//! The upstream payload is duck-typed: every level may be absent, and the
//! metric cells arrive as numbers or numeric strings depending on the report.
//! Everything missing is treated as explicitly absent, never assumed present.

use std::collections::HashSet;

use common::protocol::VariationStats;
use serde::Deserialize;
use serde_json::Value;

/// Parsed `getData` response body: `{ "DataFeed": [ { "Rows": [...] } ] }`,
/// with every level optional.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct GetDataResponse {
    #[serde(rename = "DataFeed", default)]
    pub data_feed: Vec<DataFeed>,
}

/// One data feed entry; only its row list matters here.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct DataFeed {
    #[serde(rename = "Rows", default)]
    pub rows: Vec<Value>,
}

/// Reduce the response to at most one [`VariationStats`] per distinct
/// creation identifier.
///
/// First occurrence wins, in the upstream row order; rows without a
/// non-empty `mv_creation` string are skipped; absent metric cells count
/// as 0. An absent `DataFeed` or `Rows` yields an empty result, not an
/// error.
pub fn reduce_variations(resp: &GetDataResponse) -> Vec<VariationStats> {
    let rows = resp
        .data_feed
        .first()
        .map(|feed| feed.rows.as_slice())
        .unwrap_or_default();

    let mut seen: HashSet<&str> = HashSet::new();
    let mut variations = Vec::new();
    for row in rows {
        let Some(name) = row
            .get("mv_creation")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
        else {
            continue;
        };
        if !seen.insert(name) {
            continue;
        }
        variations.push(VariationStats {
            mv_creation: name.to_owned(),
            visitors: coerce_count(row.get("m_unique_visitors")),
            conversions: coerce_count(row.get("m_conv1_visitors")),
        });
    }
    variations
}

/// Coerce a metric cell to a non-negative integer, defaulting to 0 for
/// anything absent, negative, or unparsable.
fn coerce_count(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().map(|f| if f > 0.0 { f as u64 } else { 0 }))
            .unwrap_or(0),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| if f > 0.0 { f as u64 } else { 0 }))
                .unwrap_or(0)
        }
        _ => 0,
    }
}
