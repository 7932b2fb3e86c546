//! Exact inner-product search over a flat, row-major vector buffer.

use std::cmp::Ordering;

/// Id reported for result slots that have no stored vector behind them.
pub const NO_RESULT: i64 = -1;

/// Divides `v` by its Euclidean norm. A zero vector is left unchanged.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm = if norm > 0.0 && norm.is_finite() { norm } else { 1.0 };
    for x in v.iter_mut() {
        *x /= norm;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlatIpIndex {
    dim: usize,
    data: Vec<f32>,
}

impl FlatIpIndex {
    pub fn new(dim: usize) -> Self {
        Self { dim, data: Vec::new() }
    }

    /// Wraps an existing row-major buffer of `data.len() / dim` vectors.
    pub(crate) fn from_raw(dim: usize, data: Vec<f32>) -> Self {
        debug_assert!(dim > 0 && data.len() % dim == 0);
        Self { dim, data }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Appends one vector; its ordinal is the previous `len()`.
    pub(crate) fn push(&mut self, v: &[f32]) {
        debug_assert_eq!(v.len(), self.dim);
        self.data.extend_from_slice(v);
    }

    pub fn vector(&self, ordinal: usize) -> &[f32] {
        &self.data[ordinal * self.dim..(ordinal + 1) * self.dim]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dim)
    }

    /// Scores every stored vector against `query` and returns the best `k`
    /// as parallel `(scores, ids)`, best first, ties by ascending id.
    ///
    /// Both outputs always have length `k`; slots beyond `len()` hold
    /// `NO_RESULT` with a score of negative infinity. Callers that take `k`
    /// from user input should clamp it to `len()` first.
    pub fn search(&self, query: &[f32], k: usize) -> (Vec<f32>, Vec<i64>) {
        debug_assert_eq!(query.len(), self.dim);
        let mut hits: Vec<(usize, f32)> = self
            .iter()
            .enumerate()
            .map(|(i, v)| (i, dot(v, query)))
            .collect();
        let by_rank = |a: &(usize, f32), b: &(usize, f32)| -> Ordering {
            b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
        };
        if k < hits.len() {
            hits.select_nth_unstable_by(k, by_rank);
            hits.truncate(k);
        }
        hits.sort_by(by_rank);

        let mut scores = Vec::with_capacity(hits.len());
        let mut ids = Vec::with_capacity(hits.len());
        for (i, s) in hits {
            scores.push(s);
            ids.push(i as i64);
        }
        scores.resize(k, f32::NEG_INFINITY);
        ids.resize(k, NO_RESULT);
        (scores, ids)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(rows: &[&[f32]]) -> FlatIpIndex {
        let mut idx = FlatIpIndex::new(rows[0].len());
        for r in rows {
            idx.push(r);
        }
        idx
    }

    #[test]
    fn normalize_guards_zero_vector() {
        let mut zero = vec![0.0f32; 3];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0, 0.0]);

        let mut v = vec![3.0f32, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6 && (v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn pads_with_sentinel_when_k_exceeds_len() {
        let idx = index_of(&[&[1.0, 0.0], &[0.0, 1.0]]);
        let (scores, ids) = idx.search(&[1.0, 0.0], 4);
        assert_eq!(ids, vec![0, 1, NO_RESULT, NO_RESULT]);
        assert_eq!(scores[0], 1.0);
        assert_eq!(scores[2], f32::NEG_INFINITY);
    }

    #[test]
    fn ties_break_by_ascending_ordinal() {
        let idx = index_of(&[&[0.0, 1.0], &[1.0, 0.0], &[0.0, 1.0], &[1.0, 0.0]]);
        let (_, ids) = idx.search(&[1.0, 0.0], 3);
        assert_eq!(ids, vec![1, 3, 0]);
    }

    #[test]
    fn zero_k_returns_nothing() {
        let idx = index_of(&[&[1.0]]);
        let (scores, ids) = idx.search(&[1.0], 0);
        assert!(scores.is_empty() && ids.is_empty());
    }
}
