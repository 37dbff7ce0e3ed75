//! Pure TF-IDF scoring math, kept separate from the SQL that feeds it so
//! it's trivial to unit test.

/// `idf = ln((N+1)/df)` — smoothed so a term appearing in every document
/// still gets a small positive weight instead of zero.
pub fn idf(total_docs: usize, doc_frequency: usize) -> f64 {
    ((total_docs as f64 + 1.0) / doc_frequency.max(1) as f64).ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rare_terms_score_higher_than_common_terms() {
        let rare = idf(1000, 2);
        let common = idf(1000, 500);
        assert!(rare > common);
    }

    #[test]
    fn idf_is_never_negative_for_reasonable_inputs() {
        assert!(idf(10, 10) >= 0.0);
        assert!(idf(1, 1) >= 0.0);
    }
}
