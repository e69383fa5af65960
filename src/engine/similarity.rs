// ==========================================
// 排放计算引擎 - 字符串相似度
// ==========================================
// 算法: token sort ratio
//   1. 按空白切词、排序、以单空格重新拼接（与词序无关）
//   2. rapidfuzz Indel 归一化相似度，换算为 0-100
// ==========================================

use rapidfuzz::fuzz;

/// 相似度评分器（0-100）
pub trait SimilarityScorer: Send + Sync {
    fn score(&self, left: &str, right: &str) -> f64;
}

/// 与词序无关的相似度评分器
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenSortRatio;

impl SimilarityScorer for TokenSortRatio {
    fn score(&self, left: &str, right: &str) -> f64 {
        token_sort_ratio(left, right)
    }
}

/// 词序无关相似度
pub fn token_sort_ratio(left: &str, right: &str) -> f64 {
    let left = sort_tokens(left);
    let right = sort_tokens(right);
    fuzz::ratio(left.chars(), right.chars()) * 100.0
}

fn sort_tokens(value: &str) -> String {
    let mut tokens: Vec<&str> = value.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_score(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_identical_strings_score_100() {
        assert_score(token_sort_ratio("united kingdom", "united kingdom"), 100.0);
    }

    #[test]
    fn test_word_order_is_ignored() {
        assert_score(token_sort_ratio("kingdom united", "united kingdom"), 100.0);
        assert_score(token_sort_ratio("paper products", "products  paper"), 100.0);
    }

    #[test]
    fn test_single_substitution_score() {
        // 一次替换 = 一次删除 + 一次插入: 1 - 2 / 8 = 0.75
        assert_score(token_sort_ratio("abcd", "abce"), 75.0);
    }

    #[test]
    fn test_disjoint_strings_score_zero() {
        assert_score(token_sort_ratio("abc", "xyz"), 0.0);
        assert_score(token_sort_ratio("abc", ""), 0.0);
    }

    #[test]
    fn test_scorer_trait_delegates() {
        let scorer = TokenSortRatio;
        assert_score(
            scorer.score("long-haul, business class", "business class long-haul,"),
            100.0,
        );
        assert!(scorer.score("united kingdom", "united states") < 80.0);
    }
}
