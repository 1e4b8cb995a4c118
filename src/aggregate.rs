//! Stream aggregator: groups normalized records into per-stream interval series.

use std::collections::BTreeMap;

use tracing::debug;

use crate::models::NormalizedRecord;

/// Intervals are quantized to whole nanoseconds. Capture timestamps carry at
/// most nanosecond precision; anything finer is float noise from rebasing
/// and would show up as spurious jitter.
const NANOS_PER_SECOND: f64 = 1e9;

/// All records sharing one stream id, in chronological order.
#[derive(Debug, Clone)]
pub struct Stream<'a> {
    // ---
    pub id: String,
    pub records: Vec<&'a NormalizedRecord>,
    /// Successive differences of `relative_time`; `records.len() - 1` long.
    pub intervals: Vec<f64>,
}

impl Stream<'_> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Grouping result: analyzable streams plus counts of what was left out.
#[derive(Debug, Clone, Default)]
pub struct Grouping<'a> {
    // ---
    /// Streams with at least the minimum length, ordered by id.
    pub streams: Vec<Stream<'a>>,
    /// Number of distinct stream ids seen, analyzable or not.
    pub stream_count: usize,
    /// Streams dropped for being shorter than the minimum length.
    pub excluded: usize,
}

/// Group `records` (already sorted by `relative_time`) by stream id.
///
/// Streams shorter than `min_len` are omitted entirely.
pub fn group_streams(records: &[NormalizedRecord], min_len: usize) -> Grouping<'_> {
    // ---
    let mut groups: BTreeMap<&str, Vec<&NormalizedRecord>> = BTreeMap::new();
    for r in records {
        groups.entry(r.stream_id.as_str()).or_default().push(r);
    }

    let stream_count = groups.len();
    let mut excluded = 0;
    let mut streams = Vec::new();

    for (id, group) in groups {
        if group.len() < min_len {
            debug!("Excluding stream {} with {} record(s)", id, group.len());
            excluded += 1;
            continue;
        }
        let intervals = group
            .windows(2)
            .map(|w| quantize(w[1].relative_time - w[0].relative_time))
            .collect();
        streams.push(Stream {
            id: id.to_string(),
            records: group,
            intervals,
        });
    }

    Grouping {
        streams,
        stream_count,
        excluded,
    }
}

fn quantize(interval: f64) -> f64 {
    (interval * NANOS_PER_SECOND).round() / NANOS_PER_SECOND
}
