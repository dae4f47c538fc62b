//! Plate-recognition provider client.
//!
//! The core never touches pixels: an image goes out, the best
//! `{plate, confidence}` pair comes back. Candidate scoring picks a
//! plausible plate out of the provider's guesses.

use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use crate::config::PlateProviderConfig;
use crate::error::ServiceError;
use crate::plate::normalize_plate;

const REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// The provider's best guess for one frame.
#[derive(Debug, Clone, Serialize)]
pub struct PlateScan {
    pub plate: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct ProviderResult {
    #[serde(default)]
    plate: String,
    #[serde(default)]
    confidence: f64,
}

#[derive(Clone)]
pub struct PlateRecognitionClient {
    http: Client,
    config: PlateProviderConfig,
}

impl PlateRecognitionClient {
    pub fn new(config: PlateProviderConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECONDS))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { http, config }
    }

    /// Sends image bytes to the provider and returns the best plate guess.
    pub async fn scan(&self, image: &[u8], mime_type: &str) -> Result<PlateScan, ServiceError> {
        if !self.config.is_configured() {
            return Err(ServiceError::UpstreamMisconfigured(
                "Plate recognition API token not configured".to_string(),
            ));
        }

        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        let url = format!(
            "{}/v1/plate-reader/",
            self.config.base_url.trim_end_matches('/')
        );

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Token {}", self.config.api_token))
            .json(&json!({
                "uploads": [{ "image": format!("data:{mime_type};base64,{encoded}") }],
            }))
            .send()
            .await
            .map_err(|err| ServiceError::Upstream(format!("Plate recognition failed: {err}")))?;

        match response.status().as_u16() {
            401 => {
                return Err(ServiceError::UpstreamMisconfigured(
                    "Invalid plate recognition API token".to_string(),
                ))
            }
            429 => {
                return Err(ServiceError::UpstreamRateLimited(
                    "Plate recognition rate limit exceeded".to_string(),
                ))
            }
            _ => {}
        }

        let body: serde_json::Value = response
            .error_for_status()
            .map_err(|err| ServiceError::Upstream(format!("Plate recognition failed: {err}")))?
            .json()
            .await
            .map_err(|err| ServiceError::Upstream(format!("Malformed provider response: {err}")))?;

        let results: Vec<ProviderResult> = body
            .pointer("/uploads/0/results")
            .or_else(|| body.pointer("/results"))
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();

        Ok(best_plate(&results))
    }
}

/// Picks the best candidate: highest-confidence result with a plausible
/// plate shape, falling back to the top confidence when nothing scores well.
fn best_plate(results: &[ProviderResult]) -> PlateScan {
    let mut sorted: Vec<&ProviderResult> = results.iter().collect();
    sorted.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    for result in &sorted {
        let (plate, score) = score_candidate(&result.plate);
        if !plate.is_empty() && score >= 10 {
            return PlateScan {
                plate,
                confidence: result.confidence,
            };
        }
    }

    sorted
        .first()
        .map(|r| PlateScan {
            plate: normalize_plate(&r.plate),
            confidence: r.confidence,
        })
        .unwrap_or(PlateScan {
            plate: String::new(),
            confidence: 0.0,
        })
}

/// Scores a normalized candidate for plate plausibility.
fn score_candidate(token: &str) -> (String, i32) {
    let s = normalize_plate(token);
    if s.is_empty() {
        return (s, -1);
    }

    let len = s.len();
    if !(6..=14).contains(&len) {
        return (s, 0);
    }

    let has_letters = s.chars().any(|c| c.is_ascii_alphabetic());
    let has_digits = s.chars().any(|c| c.is_ascii_digit());

    let mut score = 10;
    if has_letters && has_digits {
        score += 20;
    } else {
        score -= 10;
    }

    if has_triple_repeat(&s) {
        score -= 5;
    }
    if !has_letters || !has_digits {
        score -= 5;
    }
    if looks_like_indian_plate(&s) {
        score += 15;
    }

    score -= (10 - len as i32).abs();
    (s, score)
}

fn has_triple_repeat(s: &str) -> bool {
    s.as_bytes().windows(3).any(|w| w[0] == w[1] && w[1] == w[2])
}

/// Matches the common Indian series format:
/// two letters, 1-2 digits, 1-3 letters, 3-4 digits.
fn looks_like_indian_plate(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;

    let take = |i: &mut usize, min: usize, max: usize, pred: fn(&u8) -> bool| -> bool {
        let start = *i;
        while *i < bytes.len() && *i - start < max && pred(&bytes[*i]) {
            *i += 1;
        }
        (*i - start) >= min
    };

    take(&mut i, 2, 2, u8::is_ascii_uppercase)
        && take(&mut i, 1, 2, u8::is_ascii_digit)
        && take(&mut i, 1, 3, u8::is_ascii_uppercase)
        && take(&mut i, 3, 4, u8::is_ascii_digit)
        && i == bytes.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(plate: &str, confidence: f64) -> ProviderResult {
        ProviderResult {
            plate: plate.to_string(),
            confidence,
        }
    }

    #[test]
    fn recognizes_indian_series_format() {
        assert!(looks_like_indian_plate("KA01AB1234"));
        assert!(looks_like_indian_plate("MH2X999"));
        assert!(!looks_like_indian_plate("1234567"));
        assert!(!looks_like_indian_plate("ABCDEFG"));
        assert!(!looks_like_indian_plate("KA01AB12345678"));
    }

    #[test]
    fn scoring_prefers_mixed_alphanumeric() {
        let (_, plate_score) = score_candidate("KA01AB1234");
        let (_, digits_score) = score_candidate("123456789");
        assert!(plate_score > digits_score);
        assert!(plate_score >= 10);
    }

    #[test]
    fn rejects_out_of_range_lengths() {
        assert_eq!(score_candidate("AB1").1, 0);
        assert_eq!(score_candidate("").1, -1);
    }

    #[test]
    fn best_plate_skips_high_confidence_garbage() {
        let results = vec![result("???", 0.99), result("KA01AB1234", 0.80)];
        let best = best_plate(&results);
        assert_eq!(best.plate, "KA01AB1234");
        assert!((best.confidence - 0.80).abs() < 1e-9);
    }

    #[test]
    fn best_plate_falls_back_to_top_confidence() {
        let results = vec![result("AB1", 0.7), result("XY2", 0.6)];
        let best = best_plate(&results);
        assert_eq!(best.plate, "AB1");
    }

    #[test]
    fn best_plate_handles_empty_results() {
        let best = best_plate(&[]);
        assert!(best.plate.is_empty());
        assert_eq!(best.confidence, 0.0);
    }
}
