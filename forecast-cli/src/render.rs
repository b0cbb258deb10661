//! Plain-text output for the terminal.

use std::collections::BTreeMap;

use forecast_core::{
    FetchReport,
    analysis::{self, Feature, FeatureMeans, FeatureRanges},
};

const LABEL_WIDTH: usize = 12;

pub fn fetch_summary(report: &FetchReport) -> String {
    let mut lines: Vec<String> = report
        .succeeded
        .iter()
        .map(|(id, count)| format!("  ok      {:<12} {count} records", id.as_str()))
        .collect();

    lines.extend(report.failures.iter().map(|failure| {
        format!("  FAILED  {:<12} {}: {}", failure.provider.as_str(), failure.kind, failure.message)
    }));

    lines.push(format!(
        "{} records from {} providers, {} failed",
        report.records.len(),
        report.succeeded.len(),
        report.failures.len()
    ));

    join_lines(lines)
}

/// One feature as a table: a row per key, a column per source, followed by
/// the pairwise mean differences between sources.
pub fn comparison_table<K: Ord + Clone>(
    feature: Feature,
    sources: &[String],
    means: &BTreeMap<(String, K), FeatureMeans>,
    label: impl Fn(&K) -> String,
) -> String {
    let mut lines = grid(feature, sources, means, 12, label, |m| {
        m.get(feature).map(|v| format!("{v:.1}"))
    });

    if !sources.is_empty() {
        lines.extend(analysis::source_pairs(sources).into_iter().filter_map(|(a, b)| {
            analysis::mean_abs_difference(means, &a, &b, feature)
                .map(|(diff, n)| format!("  {a} vs {b}: mean |diff| {diff:.2} over {n}"))
        }));
    }

    join_lines(lines)
}

/// One feature as `min..max` per source and day of month.
pub fn range_table(
    feature: Feature,
    sources: &[String],
    ranges: &BTreeMap<(String, u32), FeatureRanges>,
) -> String {
    let lines = grid(feature, sources, ranges, 16, |day| day.to_string(), |r| {
        r.get(feature).map(|(lo, hi)| format!("{lo:.1}..{hi:.1}"))
    });

    join_lines(lines)
}

/// Title, header row and one row per distinct key; missing cells print `-`.
fn grid<K: Ord + Clone, G>(
    feature: Feature,
    sources: &[String],
    groups: &BTreeMap<(String, K), G>,
    width: usize,
    label: impl Fn(&K) -> String,
    cell: impl Fn(&G) -> Option<String>,
) -> Vec<String> {
    let unit = feature.unit();
    let title = if unit.is_empty() { feature.to_string() } else { format!("{feature} [{unit}]") };
    let mut lines = vec![String::new(), title];

    if sources.is_empty() {
        lines.push("  no forecasts match".to_string());
        return lines;
    }

    let header: String = sources.iter().map(|source| format!("{source:>width$}")).collect();
    lines.push(format!("{:<LABEL_WIDTH$}{header}", ""));

    let mut keys: Vec<&K> = groups.keys().map(|(_, k)| k).collect();
    keys.sort();
    keys.dedup();

    for key in keys {
        let row: String = sources
            .iter()
            .map(|source| {
                let value = groups
                    .get(&(source.clone(), key.clone()))
                    .and_then(&cell)
                    .unwrap_or_else(|| "-".to_string());
                format!("{value:>width$}")
            })
            .collect();
        lines.push(format!("{:<LABEL_WIDTH$}{row}", label(key)));
    }

    lines
}

fn join_lines(lines: Vec<String>) -> String {
    lines.into_iter().map(|line| line + "\n").collect()
}
