//! Result payload of a completed analysis.
//!
//! The job protocol treats this as opaque; the shape mirrors a
//! Lighthouse-style report (category scores, Core Web Vitals, and
//! recommendations).

use serde::{Deserialize, Serialize};

use crate::analysis::Device;

/// Upper bound of every category score.
pub const MAX_SCORE: u8 = 100;

/// Category scores, each in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scores {
    pub performance: u8,
    pub accessibility: u8,
    pub best_practices: u8,
    pub seo: u8,
}

impl Scores {
    /// All four scores in a fixed order: performance, accessibility,
    /// best practices, SEO.
    pub fn values(&self) -> [u8; 4] {
        [
            self.performance,
            self.accessibility,
            self.best_practices,
            self.seo,
        ]
    }

    pub fn is_within_range(&self) -> bool {
        self.values().iter().all(|s| *s <= MAX_SCORE)
    }
}

/// Core Web Vitals and related lab metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebVitals {
    /// Largest Contentful Paint.
    pub lcp_ms: u32,
    /// First Input Delay.
    pub fid_ms: u32,
    /// Cumulative Layout Shift (unitless).
    pub cls: f64,
    /// First Contentful Paint.
    pub fcp_ms: u32,
    /// Time To First Byte.
    pub ttfb_ms: u32,
    /// Total Blocking Time.
    pub tbt_ms: u32,
    pub speed_index_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub id: String,
    pub title: String,
    pub description: String,
    pub impact: Impact,
}

/// Payload stored on a job once it completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub analyzed_url: String,
    pub device: Device,
    pub scores: Scores,
    pub metrics: WebVitals,
    pub recommendations: Vec<Recommendation>,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_serialize_camel_case() {
        let scores = Scores {
            performance: 91,
            accessibility: 88,
            best_practices: 100,
            seo: 73,
        };
        let json = serde_json::to_value(scores).unwrap();
        assert_eq!(json["bestPractices"], 100);
        assert_eq!(json["seo"], 73);
    }

    #[test]
    fn out_of_range_score_detected() {
        let scores = Scores {
            performance: 101,
            accessibility: 0,
            best_practices: 0,
            seo: 0,
        };
        assert!(!scores.is_within_range());
    }
}
