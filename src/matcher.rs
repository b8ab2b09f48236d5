//! Bounded similarity matcher - Fuzzy name resolution with an edit budget.
//!
//! Legacy price sheets spell product names slightly differently from the
//! catalog, so imports resolve names by bounded Levenshtein distance instead
//! of equality. The threshold (a percent, 0-100) fixes an edit budget up
//! front; candidates are pruned by first character and by length before the
//! dynamic program runs, and the banded sweep aborts as soon as a row's
//! minimum proves the candidate is over budget.
//!
//! All strings entering this module are expected to already be in
//! [`crate::text::normalize`] form.

use std::collections::HashMap;

/// Outcome of scoring one candidate against a target.
///
/// `accepted` is the threshold verdict. A rejection from the length
/// pre-filter reports `distance` 0 because the dynamic program never ran; a
/// rejection from the banded sweep reports the first row minimum that
/// overran the budget.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Similarity {
    /// `100 * (1 - distance / max_len)`, or 0.0 when rejected early
    pub score: f64,
    /// Raw edit distance as far as it was computed
    pub distance: usize,
    /// Whether `score` cleared the threshold
    pub accepted: bool,
}

/// Scores `candidate` against `target` at the given threshold.
///
/// A threshold of 100 or more degrades to exact equality. Otherwise the edit
/// budget is `floor((100 - threshold) * max_len / 100)`, never below 1, and
/// a candidate whose length alone exceeds the budget is rejected without
/// running the dynamic program.
#[must_use]
pub fn similarity(target: &str, candidate: &str, threshold: f64) -> Similarity {
    let target: Vec<char> = target.chars().collect();
    let candidate: Vec<char> = candidate.chars().collect();
    similarity_chars(&target, &candidate, threshold)
}

fn similarity_chars(target: &[char], candidate: &[char], threshold: f64) -> Similarity {
    let max_len = target.len().max(candidate.len());
    if max_len == 0 {
        return Similarity {
            score: 100.0,
            distance: 0,
            accepted: true,
        };
    }
    if threshold >= 100.0 {
        return if target == candidate {
            Similarity {
                score: 100.0,
                distance: 0,
                accepted: true,
            }
        } else {
            Similarity {
                score: 0.0,
                distance: 1,
                accepted: false,
            }
        };
    }

    let budget = ((100.0 - threshold) * max_len as f64 / 100.0).floor();
    let max_distance = if budget < 1.0 { 1 } else { budget as usize };

    if target.len().abs_diff(candidate.len()) > max_distance {
        return Similarity {
            score: 0.0,
            distance: 0,
            accepted: false,
        };
    }

    let (distance, within) = levenshtein_within(target, candidate, max_distance);
    if !within {
        return Similarity {
            score: 0.0,
            distance,
            accepted: false,
        };
    }

    let score = 100.0 * (1.0 - distance as f64 / max_len as f64);
    Similarity {
        score,
        distance,
        accepted: score >= threshold,
    }
}

/// Levenshtein distance restricted to the diagonal band
/// `[i - max_distance, i + max_distance]`.
///
/// Returns `(distance, true)` when the distance is within `max_distance`.
/// Once every cell of a row exceeds the budget no later row can come back
/// under it, so the sweep returns `(row_min, false)` right there.
fn levenshtein_within(left: &[char], right: &[char], max_distance: usize) -> (usize, bool) {
    let left_len = left.len();
    let right_len = right.len();
    if left_len == 0 {
        return (right_len, right_len <= max_distance);
    }
    if right_len == 0 {
        return (left_len, left_len <= max_distance);
    }
    if left_len.abs_diff(right_len) > max_distance {
        return (max_distance + 1, false);
    }

    let mut prev: Vec<usize> = (0..=right_len).collect();
    let mut curr: Vec<usize> = vec![0; right_len + 1];

    for i in 1..=left_len {
        let start = i.saturating_sub(max_distance).max(1);
        let end = right_len.min(i + max_distance);

        curr[0] = i;
        let mut row_min = curr[0];
        // Cells outside the band count as over budget
        for cell in &mut curr[1..start] {
            *cell = max_distance + 1;
        }
        for j in start..=end {
            let cost = usize::from(left[i - 1] != right[j - 1]);
            let deletion = prev[j] + 1;
            let insertion = curr[j - 1] + 1;
            let substitution = prev[j - 1] + cost;
            curr[j] = deletion.min(insertion).min(substitution);
            row_min = row_min.min(curr[j]);
        }
        for cell in &mut curr[end + 1..=right_len] {
            *cell = max_distance + 1;
        }

        if row_min > max_distance {
            return (row_min, false);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    let distance = prev[right_len];
    (distance, distance <= max_distance)
}

/// A winning candidate returned by [`MatchPool::best_match`].
#[derive(Debug)]
pub struct Match<'a, T> {
    /// The candidate's normalized key
    pub key: &'a str,
    /// The payload stored alongside the key
    pub payload: &'a T,
    /// Similarity score of the winner
    pub score: f64,
    /// Raw edit distance of the winner
    pub distance: usize,
}

/// Candidate pool bucketed by first character.
///
/// Lookups scan only the bucket sharing the target's first character; when
/// that bucket is empty the whole pool is scanned instead, so a first-letter
/// typo degrades to a slower search rather than a miss.
pub struct MatchPool<T> {
    entries: Vec<PoolEntry<T>>,
    buckets: HashMap<char, Vec<usize>>,
}

struct PoolEntry<T> {
    key: String,
    chars: Vec<char>,
    payload: T,
}

impl<T> MatchPool<T> {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            buckets: HashMap::new(),
        }
    }

    /// Adds a candidate under its normalized key. Keys that normalize to
    /// nothing carry no identity and are ignored.
    pub fn insert(&mut self, key: String, payload: T) {
        let Some(first) = key.chars().next() else {
            return;
        };
        let index = self.entries.len();
        let chars = key.chars().collect();
        self.entries.push(PoolEntry { key, chars, payload });
        self.buckets.entry(first).or_default().push(index);
    }

    /// Number of candidates in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool holds no candidates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finds the best-scoring candidate for `target`, or None when no
    /// candidate clears the threshold.
    ///
    /// The highest score wins; equal scores fall to the lower raw distance.
    pub fn best_match(&self, target: &str, threshold: f64) -> Option<Match<'_, T>> {
        let first = target.chars().next()?;
        let target_chars: Vec<char> = target.chars().collect();

        let fallback: Vec<usize>;
        let candidates: &[usize] = match self.buckets.get(&first) {
            Some(indexes) if !indexes.is_empty() => indexes,
            _ => {
                fallback = (0..self.entries.len()).collect();
                &fallback
            }
        };

        let mut best: Option<(f64, usize, usize)> = None;
        for &index in candidates {
            let entry = &self.entries[index];
            let outcome = similarity_chars(&target_chars, &entry.chars, threshold);
            if !outcome.accepted {
                continue;
            }
            let better = match best {
                None => true,
                Some((best_score, best_distance, _)) => {
                    outcome.score > best_score
                        || (outcome.score >= best_score && outcome.distance < best_distance)
                }
            };
            if better {
                best = Some((outcome.score, outcome.distance, index));
            }
        }

        best.map(|(score, distance, index)| {
            let entry = &self.entries[index];
            Match {
                key: &entry.key,
                payload: &entry.payload,
                score,
                distance,
            }
        })
    }
}

impl<T> Default for MatchPool<T> {
    fn default() -> Self {
        Self::new()
    }
}
