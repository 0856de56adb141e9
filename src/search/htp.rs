//! Local embedding provider based on Harmonic Token Projection (HTP)
//!
//! Deterministic and training-free: every token is read as a base-2^16
//! integer, reduced modulo a set of coprime moduli and each residue is
//! placed on the unit circle. Token vectors are mean-pooled and
//! L2-normalised.
//!
//! Reference: "Harmonic Token Projection: A Vocabulary-Free, Training-Free,
//! Deterministic, and Reversible Embedding Methodology"
//! https://arxiv.org/html/2511.20665
//!
//! It only captures shared surface tokens, not meaning. Useful offline and
//! in tests; the model id passed by the generator is ignored.

use std::f64::consts::PI;

use super::embedding::EmbeddingProvider;
use crate::error::ProviderError;

/// Output dimension (two components per modulus).
pub const HTP_DIM: usize = 384;

const MODULUS_COUNT: usize = HTP_DIM / 2;

/// Longer tokens are cut to this many code points.
const TOKEN_CHAR_LIMIT: usize = 64;

/// First 192 primes.
static PRIMES: &[u64] = &[
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71,
    73, 79, 83, 89, 97, 101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151,
    157, 163, 167, 173, 179, 181, 191, 193, 197, 199, 211, 223, 227, 229, 233,
    239, 241, 251, 257, 263, 269, 271, 277, 281, 283, 293, 307, 311, 313, 317,
    331, 337, 347, 349, 353, 359, 367, 373, 379, 383, 389, 397, 401, 409, 419,
    421, 431, 433, 439, 443, 449, 457, 461, 463, 467, 479, 487, 491, 499, 503,
    509, 521, 523, 541, 547, 557, 563, 569, 571, 577, 587, 593, 599, 601, 607,
    613, 617, 619, 631, 641, 643, 647, 653, 659, 661, 673, 677, 683, 691, 701,
    709, 719, 727, 733, 739, 743, 751, 757, 761, 769, 773, 787, 797, 809, 811,
    821, 823, 827, 829, 839, 853, 857, 859, 863, 877, 881, 883, 887, 907, 911,
    919, 929, 937, 941, 947, 953, 967, 971, 977, 983, 991, 997, 1009, 1013,
    1019, 1021, 1031, 1033, 1039, 1049, 1051, 1061, 1063, 1069, 1087, 1091,
    1093, 1097, 1103, 1109, 1117, 1123, 1129, 1151, 1153, 1163, 1171, 1181,
];

#[derive(Debug, Clone)]
pub struct HtpProvider {
    moduli: Vec<u64>,
}

impl HtpProvider {
    pub fn new() -> Self {
        Self {
            moduli: PRIMES[..MODULUS_COUNT].to_vec(),
        }
    }

    /// Mean of the token projections, L2-normalised.
    ///
    /// Text without any token maps to the zero vector.
    pub fn project(&self, text: &str) -> Vec<f32> {
        let tokens = split_tokens(text);
        if tokens.is_empty() {
            return vec![0.0; HTP_DIM];
        }

        let mut pooled = vec![0.0f64; HTP_DIM];
        for token in &tokens {
            for (slot, value) in pooled.iter_mut().zip(self.project_token(token)) {
                *slot += value;
            }
        }

        let count = tokens.len() as f64;
        pooled.iter_mut().for_each(|v| *v /= count);

        let norm = pooled.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            pooled.iter().map(|v| (v / norm) as f32).collect()
        } else {
            pooled.iter().map(|v| *v as f32).collect()
        }
    }

    fn project_token(&self, token: &str) -> Vec<f64> {
        let n = token_integer(token);
        self.moduli
            .iter()
            .flat_map(|&m| {
                let theta = 2.0 * PI * ((n % m) as f64) / (m as f64);
                [theta.sin(), theta.cos()]
            })
            .collect()
    }
}

impl Default for HtpProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingProvider for HtpProvider {
    fn name(&self) -> &str {
        "htp"
    }

    fn embed_text(&self, text: &str, _model_id: &str) -> Result<Vec<f32>, ProviderError> {
        Ok(self.project(text))
    }
}

/// Code points folded as digits in base 2^16; overflow wraps.
fn token_integer(token: &str) -> u64 {
    token
        .chars()
        .take(TOKEN_CHAR_LIMIT)
        .fold(0u64, |n, c| n.wrapping_mul(65536).wrapping_add(c as u64))
}

fn split_tokens(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::similarity::cosine_similarity;

    #[test]
    fn test_deterministic_across_instances() {
        let text = "Cien años de soledad, Gabriel García Márquez";
        assert_eq!(HtpProvider::new().project(text), HtpProvider::new().project(text));
    }

    #[test]
    fn test_dimension_and_unit_norm() {
        let v = HtpProvider::new().project("Libro: Ficciones. Autor: Borges");
        assert_eq!(v.len(), HTP_DIM);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_no_tokens_gives_zero_vector() {
        let v = HtpProvider::new().project("... !!");
        assert_eq!(v.len(), HTP_DIM);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_shared_tokens_score_higher() {
        let htp = HtpProvider::new();
        let query = htp.project("novela de Borges");
        let close = htp.project("Autor: Borges. Tipo: novela");
        let far = htp.project("precio del envío a Chile");
        assert!(cosine_similarity(&query, &close) > cosine_similarity(&query, &far));
    }

    #[test]
    fn test_case_insensitive() {
        let htp = HtpProvider::new();
        assert_eq!(htp.project("RAYUELA"), htp.project("rayuela"));
    }
}
