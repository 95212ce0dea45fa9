//! Typed Piano Analytics `getData` query.
//!
//! Serialised to JSON and passed as the single `param` URL parameter. Field
//! and column names follow the Piano v3 reporting API; renames here change
//! the outbound wire format.

use serde::Serialize;

/// Columns requested for every variation query.
const COLUMNS: [&str; 4] = [
    "mv_test",
    "mv_creation",
    "m_unique_visitors",
    "m_conv1_visitors",
];

/// One page of 50 rows is plenty: variations per test number in the tens at
/// most, and the reducer deduplicates anyway.
const MAX_RESULTS: u32 = 50;

/// Structured query for one test over a closed date range.
#[derive(Debug, Clone, Serialize)]
pub struct DataQuery {
    columns: [&'static str; 4],
    sort: [&'static str; 1],
    filter: Filter,
    space: Space,
    period: Period,
    #[serde(rename = "max-results")]
    max_results: u32,
    #[serde(rename = "page-num")]
    page_num: u32,
}

#[derive(Debug, Clone, Serialize)]
struct Filter {
    property: Property,
}

#[derive(Debug, Clone, Serialize)]
struct Property {
    mv_test: Equality,
}

#[derive(Debug, Clone, Serialize)]
struct Equality {
    #[serde(rename = "$eq")]
    eq: String,
}

#[derive(Debug, Clone, Serialize)]
struct Space {
    s: [i64; 1],
}

#[derive(Debug, Clone, Serialize)]
struct Period {
    p1: [DailyRange; 1],
}

#[derive(Debug, Clone, Serialize)]
struct DailyRange {
    #[serde(rename = "type")]
    granularity: &'static str,
    start: String,
    end: String,
}

impl DataQuery {
    /// Build the query for `test_id` on site `site_id` over
    /// `[start_date, end_date]` at daily granularity, sorted by descending
    /// unique visitors.
    pub fn for_test(test_id: &str, site_id: i64, start_date: &str, end_date: &str) -> Self {
        Self {
            columns: COLUMNS,
            sort: ["-m_unique_visitors"],
            filter: Filter {
                property: Property {
                    mv_test: Equality {
                        eq: test_id.to_owned(),
                    },
                },
            },
            space: Space { s: [site_id] },
            period: Period {
                p1: [DailyRange {
                    granularity: "D",
                    start: start_date.to_owned(),
                    end: end_date.to_owned(),
                }],
            },
            max_results: MAX_RESULTS,
            page_num: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serialises_to_the_piano_wire_shape() {
        let query = DataQuery::for_test("TEST-42", 618272, "2024-01-01", "2024-01-31");
        let value = serde_json::to_value(&query).unwrap();
        assert_eq!(
            value,
            json!({
                "columns": ["mv_test", "mv_creation", "m_unique_visitors", "m_conv1_visitors"],
                "sort": ["-m_unique_visitors"],
                "filter": { "property": { "mv_test": { "$eq": "TEST-42" } } },
                "space": { "s": [618272] },
                "period": { "p1": [ { "type": "D", "start": "2024-01-01", "end": "2024-01-31" } ] },
                "max-results": 50,
                "page-num": 1
            })
        );
    }
}
