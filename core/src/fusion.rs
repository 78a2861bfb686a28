//! Weighted fusion of per-field rankings with page-rank and page-view signals.

use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use crate::config::DEFAULT_SIGNAL_WEIGHT;
use crate::rank::sort_desc;
use crate::DocId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub title: f64,
    pub body: f64,
    pub anchor: f64,
    pub page_rank: f64,
    pub page_views: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            title: DEFAULT_SIGNAL_WEIGHT,
            body: DEFAULT_SIGNAL_WEIGHT,
            anchor: DEFAULT_SIGNAL_WEIGHT,
            page_rank: DEFAULT_SIGNAL_WEIGHT,
            page_views: DEFAULT_SIGNAL_WEIGHT,
        }
    }
}

/// What to do with a candidate that has no page-rank or no page-view entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingSignalPolicy {
    /// Leave the candidate out of the fused ranking entirely.
    #[default]
    Drop,
    /// Treat the missing signal as 0 and keep the candidate.
    Zero,
}

impl FromStr for MissingSignalPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "drop" => Ok(MissingSignalPolicy::Drop),
            "zero" => Ok(MissingSignalPolicy::Zero),
            other => Err(format!("unknown missing-signal policy {other:?} (expected drop|zero)")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FusionConfig {
    pub weights: FusionWeights,
    pub missing_signal: MissingSignalPolicy,
}

/// Largest score in the list; 1 for an empty list or a zero maximum.
fn normalizer(values: impl Iterator<Item = f64>) -> f64 {
    match values.fold(None, |max: Option<f64>, v| Some(max.map_or(v, |m| m.max(v)))) {
        Some(m) if m != 0.0 => m,
        _ => 1.0,
    }
}

/// Fuses three field rankings with the external signals and returns the best `n`.
///
/// Field scores are divided by that field's own maximum; page rank and page views by
/// their maximum over the candidate set. Ties are broken by ascending doc-id.
pub fn merge(
    title: &[(DocId, f64)],
    body: &[(DocId, f64)],
    anchor: &[(DocId, f64)],
    page_rank: &HashMap<String, f64>,
    page_views: &HashMap<String, u64>,
    config: &FusionConfig,
    n: usize,
) -> Vec<(DocId, f64)> {
    let title_max = normalizer(title.iter().map(|s| s.1));
    let body_max = normalizer(body.iter().map(|s| s.1));
    let anchor_max = normalizer(anchor.iter().map(|s| s.1));

    let title: HashMap<DocId, f64> = title.iter().copied().collect();
    let body: HashMap<DocId, f64> = body.iter().copied().collect();
    let anchor: HashMap<DocId, f64> = anchor.iter().copied().collect();

    let candidates: BTreeSet<DocId> = title.keys().chain(body.keys()).chain(anchor.keys()).copied().collect();
    let keys: Vec<(DocId, String)> = candidates.iter().map(|&d| (d, d.to_string())).collect();

    let pr_max = normalizer(keys.iter().filter_map(|(_, k)| page_rank.get(k).copied()));
    let pv_max = normalizer(keys.iter().filter_map(|(_, k)| page_views.get(k).map(|&v| v as f64)));

    let w = &config.weights;
    let mut merged = Vec::with_capacity(keys.len());
    for (doc, key) in &keys {
        let (pr, pv) = match (page_rank.get(key), page_views.get(key)) {
            (Some(&pr), Some(&pv)) => (pr, pv as f64),
            _ if config.missing_signal == MissingSignalPolicy::Drop => {
                tracing::debug!(doc, "dropping fusion candidate without page rank/views");
                continue;
            }
            (pr, pv) => (pr.copied().unwrap_or(0.0), pv.map_or(0.0, |&v| v as f64)),
        };
        let field = |scores: &HashMap<DocId, f64>| scores.get(doc).copied().unwrap_or(0.0);
        let score = w.title * field(&title) / title_max
            + w.body * field(&body) / body_max
            + w.anchor * field(&anchor) / anchor_max
            + w.page_rank * pr / pr_max
            + w.page_views * pv / pv_max;
        merged.push((*doc, score));
    }
    sort_desc(&mut merged);
    merged.truncate(n);
    merged
}
