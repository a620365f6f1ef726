//! The analysis work itself.
//!
//! [`Analyzer`] is the seam between the runner and whatever produces a
//! report. [`SimulatedAnalyzer`] waits a fixed delay and then emits
//! pseudo-random scores, web vitals, and recommendations derived from them.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use perfscope_core::analysis::{AnalysisInput, Device};
use perfscope_core::report::{AnalysisResult, Impact, Recommendation, Scores, WebVitals};
use rand::Rng;

/// Failure reported by an [`Analyzer`]. The runner records its message on
/// the job as `errorMessage`.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("Target unreachable: {0}")]
    Unreachable(String),

    #[error("Analysis failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, input: &AnalysisInput) -> Result<AnalysisResult, AnalyzerError>;
}

/// Stand-in for a real browser audit.
pub struct SimulatedAnalyzer {
    delay: Duration,
}

impl SimulatedAnalyzer {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Analyzer for SimulatedAnalyzer {
    async fn analyze(&self, input: &AnalysisInput) -> Result<AnalysisResult, AnalyzerError> {
        let started = Instant::now();
        tokio::time::sleep(self.delay).await;

        let duration_ms = started.elapsed().as_millis() as u64;
        let report = simulate_report(input, &mut rand::rng(), duration_ms);
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Report generation
// ---------------------------------------------------------------------------

// Core Web Vitals "good" thresholds.
const LCP_GOOD_MS: u32 = 2500;
const FID_GOOD_MS: u32 = 100;
const CLS_GOOD: f64 = 0.1;
const TTFB_GOOD_MS: u32 = 800;
const TBT_GOOD_MS: u32 = 200;

/// Category scores below this earn a recommendation.
const SCORE_ATTENTION_THRESHOLD: u8 = 90;

/// Build a pseudo-random report for `input`. Mobile runs skew slower.
pub fn simulate_report<R: Rng + ?Sized>(
    input: &AnalysisInput,
    rng: &mut R,
    duration_ms: u64,
) -> AnalysisResult {
    let (slowdown, perf_penalty) = match input.device {
        Device::Desktop => (1.0, 0),
        Device::Mobile => (1.4, rng.random_range(5..=20u8)),
    };
    let scale = |ms: u32| (f64::from(ms) * slowdown).round() as u32;

    let scores = Scores {
        performance: rng.random_range(40..=100u8).saturating_sub(perf_penalty),
        accessibility: rng.random_range(60..=100u8),
        best_practices: rng.random_range(60..=100u8),
        seo: rng.random_range(70..=100u8),
    };

    let metrics = WebVitals {
        lcp_ms: scale(rng.random_range(1200..=4000)),
        fid_ms: scale(rng.random_range(10..=250)),
        cls: (rng.random_range(0.0..0.35f64) * 1000.0).round() / 1000.0,
        fcp_ms: scale(rng.random_range(600..=2800)),
        ttfb_ms: scale(rng.random_range(80..=900)),
        tbt_ms: scale(rng.random_range(0..=600)),
        speed_index_ms: scale(rng.random_range(1000..=5500)),
    };

    AnalysisResult {
        analyzed_url: input.url.clone(),
        device: input.device,
        scores,
        recommendations: recommend(&scores, &metrics),
        metrics,
        duration_ms,
    }
}

/// Recommendations for every metric or category outside its target,
/// highest impact first.
pub fn recommend(scores: &Scores, metrics: &WebVitals) -> Vec<Recommendation> {
    let mut out = Vec::new();
    let mut push = |id: &str, title: &str, description: String, impact: Impact| {
        out.push(Recommendation {
            id: id.to_string(),
            title: title.to_string(),
            description,
            impact,
        });
    };

    if metrics.lcp_ms > LCP_GOOD_MS {
        push(
            "largest-contentful-paint",
            "Reduce Largest Contentful Paint",
            format!(
                "LCP is {} ms (target <= {LCP_GOOD_MS} ms). Optimise hero images and preload critical resources.",
                metrics.lcp_ms
            ),
            Impact::High,
        );
    }
    if metrics.tbt_ms > TBT_GOOD_MS {
        push(
            "main-thread-work",
            "Minimise main-thread work",
            format!(
                "Total Blocking Time is {} ms (target <= {TBT_GOOD_MS} ms). Split long tasks and defer non-critical scripts.",
                metrics.tbt_ms
            ),
            Impact::High,
        );
    }
    if metrics.cls > CLS_GOOD {
        push(
            "layout-shift",
            "Avoid large layout shifts",
            format!(
                "CLS is {:.3} (target <= {CLS_GOOD}). Reserve space for images, ads and embeds.",
                metrics.cls
            ),
            Impact::Medium,
        );
    }
    if metrics.fid_ms > FID_GOOD_MS {
        push(
            "input-delay",
            "Improve input responsiveness",
            format!(
                "First Input Delay is {} ms (target <= {FID_GOOD_MS} ms).",
                metrics.fid_ms
            ),
            Impact::Medium,
        );
    }
    if metrics.ttfb_ms > TTFB_GOOD_MS {
        push(
            "server-response-time",
            "Reduce server response time",
            format!(
                "TTFB is {} ms (target <= {TTFB_GOOD_MS} ms). Add caching or a CDN in front of the origin.",
                metrics.ttfb_ms
            ),
            Impact::Medium,
        );
    }
    if scores.accessibility < SCORE_ATTENTION_THRESHOLD {
        push(
            "accessibility-audit",
            "Fix accessibility issues",
            format!(
                "Accessibility score is {}. Check colour contrast, alt text and form labels.",
                scores.accessibility
            ),
            Impact::Medium,
        );
    }
    if scores.best_practices < SCORE_ATTENTION_THRESHOLD {
        push(
            "best-practices",
            "Address best-practice warnings",
            format!(
                "Best practices score is {}. Review console errors and deprecated APIs.",
                scores.best_practices
            ),
            Impact::Low,
        );
    }
    if scores.seo < SCORE_ATTENTION_THRESHOLD {
        push(
            "seo-metadata",
            "Improve search metadata",
            format!(
                "SEO score is {}. Add meta descriptions and descriptive link text.",
                scores.seo
            ),
            Impact::Low,
        );
    }

    out
}
