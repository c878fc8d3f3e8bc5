/*!
 * Character-level string similarity.
 *
 * `sequence_ratio` scores how much of two strings is shared in order, using
 * the longest common subsequence: `2 * LCS / (len(a) + len(b))`. It drives
 * the untranslated-echo check on oracle responses.
 *
 * `partial_ratio` slides the shorter string over the longer one and keeps
 * the best window score. It is used to pair an episode tag with a foreign
 * subtitle filename that embeds it among other words.
 */

/// Similarity matcher with a configurable acceptance threshold
#[derive(Debug, Clone)]
pub struct SimilarityMatcher {
    threshold: f64,
}

impl SimilarityMatcher {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    /// Best candidate by partial ratio, if it scores above the threshold
    pub fn find_best_match<'a, T: AsRef<str>>(&self, needle: &str, candidates: &'a [T]) -> Option<(&'a T, f64)> {
        let needle = needle.to_lowercase();
        let mut best: Option<(&T, f64)> = None;

        for candidate in candidates {
            let score = partial_ratio(&needle, &candidate.as_ref().to_lowercase());
            if score <= self.threshold {
                continue;
            }
            match best {
                Some((_, best_score)) if best_score >= score => {}
                _ => best = Some((candidate, score)),
            }
        }

        best
    }
}

/// `2 * LCS / (|a| + |b|)` over chars; two empty strings are identical
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    ratio_of(&a, &b)
}

/// Best `sequence_ratio` of the shorter string against equal-length windows of the longer one
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (short, long) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };

    if short.is_empty() {
        return if long.is_empty() { 1.0 } else { 0.0 };
    }

    let mut best: f64 = 0.0;
    for start in 0..=(long.len() - short.len()) {
        let score = ratio_of(short, &long[start..start + short.len()]);
        if score > best {
            best = score;
            if best >= 1.0 {
                break;
            }
        }
    }
    best
}

fn ratio_of(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * lcs_len(a, b) as f64 / total as f64
}

/// Longest common subsequence length, two-row dynamic programming
fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let mut prev_row = vec![0usize; b.len() + 1];
    let mut curr_row = vec![0usize; b.len() + 1];

    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            curr_row[j + 1] = if ca == cb {
                prev_row[j] + 1
            } else {
                prev_row[j + 1].max(curr_row[j])
            };
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[b.len()]
}
