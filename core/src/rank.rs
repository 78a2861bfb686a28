//! TF-IDF scoring over a single field index.
//!
//! Query coordinates are positional: one slot per query token, so a repeated
//! token owns several slots. Only the first slot of a repeated token carries the
//! query weight, while every slot of that token carries the document weight.

use std::collections::{BTreeMap, HashMap};

use crate::codec::PostingReader;
use crate::config::{IDF_EPSILON, SCORE_DECIMALS};
use crate::error::{IndexError, Result};
use crate::{DocId, InvertedIndex};

/// Summed document-side tf-idf keyed by `(doc_id, term)`.
pub type CandidateScores = BTreeMap<(DocId, String), f64>;

/// Query tf-idf vector, one coordinate per token position.
pub fn query_vector<S: AsRef<str>>(tokens: &[S], index: &InvertedIndex) -> Vec<f64> {
    let mut vec = vec![0.0; tokens.len()];
    if tokens.is_empty() {
        return vec;
    }
    let len = tokens.len() as f64;
    let n = index.num_docs() as f64;

    let mut first_seen: HashMap<&str, (usize, usize)> = HashMap::new();
    for (pos, token) in tokens.iter().enumerate() {
        first_seen.entry(token.as_ref()).or_insert((pos, 0)).1 += 1;
    }
    for (token, (pos, count)) in first_seen {
        if !index.contains(token) {
            continue;
        }
        let tf = count as f64 / len;
        let idf = (n / (index.df(token) as f64 + IDF_EPSILON)).log10();
        vec[pos] = tf * idf;
    }
    vec
}

/// Document-side weights `(tf / doc_len) * log10(N / df)` for every posting of every
/// query token occurrence. A token repeated in the query adds its weight once per occurrence.
pub fn candidate_scores<S: AsRef<str>>(
    tokens: &[S],
    index: &InvertedIndex,
    reader: &mut PostingReader<'_>,
) -> Result<CandidateScores> {
    let n = index.num_docs() as f64;
    let mut scores = CandidateScores::new();
    for token in tokens {
        let term = token.as_ref();
        let postings = index.read_posting_list(reader, term)?;
        if postings.is_empty() {
            continue;
        }
        let idf = (n / index.df(term) as f64).log10();
        for p in postings {
            let doc_len = index.doc_length(p.doc_id).filter(|&l| l > 0).ok_or_else(|| {
                IndexError::corruption(
                    index.paths().descriptor(),
                    format!("no document length for doc {} in posting list of {term:?}", p.doc_id),
                )
            })?;
            let tfidf = (p.tf as f64 / doc_len as f64) * idf;
            *scores.entry((p.doc_id, term.to_string())).or_insert(0.0) += tfidf;
        }
    }
    Ok(scores)
}

/// Sparse candidate matrix stored row-major: one row per candidate document
/// (ascending doc-id), one column per query token position.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateMatrix {
    doc_ids: Vec<DocId>,
    width: usize,
    cells: Vec<f64>,
}

impl CandidateMatrix {
    pub fn from_scores<S: AsRef<str>>(tokens: &[S], scores: &CandidateScores) -> Self {
        let mut doc_ids: Vec<DocId> = scores.keys().map(|(doc, _)| *doc).collect();
        doc_ids.dedup();
        let width = tokens.len();
        let mut cells = vec![0.0; doc_ids.len() * width];

        let mut row = 0;
        for ((doc, term), &score) in scores {
            while doc_ids[row] != *doc {
                row += 1;
            }
            for (col, token) in tokens.iter().enumerate() {
                if token.as_ref() == term {
                    cells[row * width + col] = score;
                }
            }
        }
        Self { doc_ids, width, cells }
    }

    pub fn doc_ids(&self) -> &[DocId] {
        &self.doc_ids
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.cells[i * self.width..(i + 1) * self.width]
    }

    pub fn get(&self, doc_id: DocId, pos: usize) -> Option<f64> {
        let row = self.doc_ids.binary_search(&doc_id).ok()?;
        self.row(row).get(pos).copied()
    }

    pub fn rows(&self) -> impl Iterator<Item = (DocId, &[f64])> + '_ {
        self.doc_ids.iter().enumerate().map(move |(i, doc)| (*doc, self.row(i)))
    }
}

pub fn candidate_matrix<S: AsRef<str>>(
    tokens: &[S],
    index: &InvertedIndex,
    reader: &mut PostingReader<'_>,
) -> Result<CandidateMatrix> {
    let scores = candidate_scores(tokens, index, reader)?;
    Ok(CandidateMatrix::from_scores(tokens, &scores))
}

/// `dot(row, q) / (|q| * |q|)` per candidate. The query norm appears twice;
/// the row norm is not used. A zero query vector scores every candidate 0.
pub fn cosine_similarity(matrix: &CandidateMatrix, query: &[f64]) -> Vec<(DocId, f64)> {
    let q_norm_sq: f64 = query.iter().map(|q| q * q).sum();
    matrix
        .rows()
        .map(|(doc, row)| {
            if q_norm_sq == 0.0 {
                return (doc, 0.0);
            }
            let dot: f64 = row.iter().zip(query).map(|(d, q)| d * q).sum();
            (doc, dot / q_norm_sq)
        })
        .collect()
}

pub fn round_score(score: f64) -> f64 {
    let scale = 10f64.powi(SCORE_DECIMALS);
    (score * scale).round() / scale
}

/// Rounds to `SCORE_DECIMALS` digits and keeps the best `n`, ties broken by ascending doc-id.
pub fn top_n(scores: &[(DocId, f64)], n: usize) -> Vec<(DocId, f64)> {
    let mut rounded: Vec<(DocId, f64)> = scores.iter().map(|&(doc, s)| (doc, round_score(s))).collect();
    sort_desc(&mut rounded);
    rounded.truncate(n);
    rounded
}

/// Vectorize, score candidates, cosine, top-n: the body-field ranking.
pub fn top_n_for_query<S: AsRef<str>>(
    tokens: &[S],
    index: &InvertedIndex,
    reader: &mut PostingReader<'_>,
    n: usize,
) -> Result<Vec<(DocId, f64)>> {
    let matrix = candidate_matrix(tokens, index, reader)?;
    let query = query_vector(tokens, index);
    Ok(top_n(&cosine_similarity(&matrix, &query), n))
}

/// Membership ranking for short fields: each token occurrence adds `1 / len(tokens)`
/// to every document in its posting list. Returns every matched document.
pub fn overlap_rank<S: AsRef<str>>(
    tokens: &[S],
    index: &InvertedIndex,
    reader: &mut PostingReader<'_>,
) -> Result<Vec<(DocId, f64)>> {
    let mut scores: HashMap<DocId, f64> = HashMap::new();
    if tokens.is_empty() {
        return Ok(Vec::new());
    }
    let step = 1.0 / tokens.len() as f64;
    for token in tokens {
        for p in index.read_posting_list(reader, token.as_ref())? {
            *scores.entry(p.doc_id).or_insert(0.0) += step;
        }
    }
    let mut ranked: Vec<(DocId, f64)> = scores.into_iter().collect();
    sort_desc(&mut ranked);
    Ok(ranked)
}

pub(crate) fn sort_desc(scores: &mut [(DocId, f64)]) {
    scores.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix_from(tokens: &[&str], entries: &[(DocId, &str, f64)]) -> CandidateMatrix {
        let scores: CandidateScores = entries.iter().map(|&(d, t, s)| ((d, t.to_string()), s)).collect();
        CandidateMatrix::from_scores(tokens, &scores)
    }

    #[test]
    fn duplicate_token_columns_share_the_score() {
        let m = matrix_from(&["a", "b", "a"], &[(4, "a", 0.5), (2, "b", 0.25)]);
        assert_eq!(m.doc_ids(), &[2, 4]);
        assert_eq!(m.row(0), &[0.0, 0.25, 0.0]);
        assert_eq!(m.row(1), &[0.5, 0.0, 0.5]);
        assert_eq!(m.get(4, 2), Some(0.5));
        assert_eq!(m.get(3, 0), None);
    }

    #[test]
    fn cosine_uses_query_norm_squared() {
        let m = matrix_from(&["a", "b"], &[(1, "a", 1.0), (1, "b", 1.0)]);
        let scores = cosine_similarity(&m, &[2.0, 0.0]);
        // dot = 2, |q|^2 = 4
        assert_eq!(scores, vec![(1, 0.5)]);
    }

    #[test]
    fn zero_query_scores_zero() {
        let m = matrix_from(&["a"], &[(1, "a", 3.0)]);
        assert_eq!(cosine_similarity(&m, &[0.0]), vec![(1, 0.0)]);
        let empty = matrix_from(&[], &[]);
        assert!(cosine_similarity(&empty, &[]).is_empty());
    }

    #[test]
    fn top_n_rounds_and_breaks_ties_by_doc_id() {
        let scores = vec![(9, 0.123456), (3, 0.5), (5, 0.1234549), (1, 0.123456)];
        let top = top_n(&scores, 3);
        assert_eq!(top, vec![(3, 0.5), (1, 0.12346), (9, 0.12346)]);
        assert_eq!(top_n(&scores, 10).len(), 4);
        assert!(top_n(&scores, 0).is_empty());
    }

    #[test]
    fn top_n_is_non_increasing() {
        let scores: Vec<(DocId, f64)> = (0..50).map(|i| (i, ((i * 37) % 11) as f64 / 7.0)).collect();
        let top = top_n(&scores, 20);
        assert_eq!(top.len(), 20);
        assert!(top.windows(2).all(|w| w[0].1 >= w[1].1));
    }
}
