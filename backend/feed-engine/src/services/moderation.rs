//! Pre-publish moderation gate.
//!
//! Combines a static banned-term/pattern matcher with an optional external
//! image classifier. The classifier is fail-open: publishing stays
//! available when it is down, and the degraded 0.5 confidence is visible
//! in the verdict for downstream audit.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ModerationConfig;
use crate::domain::DraftContent;

/// Confidence reported when the image classifier could not be consulted
pub const FAIL_OPEN_CONFIDENCE: f32 = 0.5;

/// Default banned terms checked as case-insensitive substrings
const DEFAULT_BANNED_TERMS: &[&str] = &[
    "nude",
    "nudes",
    "kys",
    "onlyfans",
];

/// Category-labelled patterns compiled once
static PATTERN_CHECKS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        (
            "self_harm",
            Regex::new(r"(?i)\b(kill\s+(yourself|myself)|suicide|self[-\s]?harm|end\s+my\s+life)\b")
                .expect("self-harm pattern is valid"),
        ),
        (
            "hate",
            Regex::new(r"(?i)\b(death\s+to\s+\w+|subhuman|ethnic\s+cleansing)\b")
                .expect("hate pattern is valid"),
        ),
        (
            "drugs",
            Regex::new(r"(?i)\b(cocaine|heroin|fentanyl|meth|buy\s+drugs|sell\s+drugs)\b")
                .expect("drugs pattern is valid"),
        ),
    ]
});

/// Scope of a moderation check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationMode {
    /// Comments: text rules only, never calls the classifier
    TextOnly,
    /// Posts: text rules plus the external image classifier
    Full,
}

/// Outcome of a moderation check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationVerdict {
    pub clean: bool,
    pub category: Option<String>,
    /// Signal strength; capped below 1.0 for static matches and fixed at
    /// [`FAIL_OPEN_CONFIDENCE`] when the classifier was unavailable
    pub confidence: f32,
}

impl ModerationVerdict {
    fn clean_text() -> Self {
        Self {
            clean: true,
            category: None,
            confidence: 0.0,
        }
    }

    fn fail_open() -> Self {
        Self {
            clean: true,
            category: None,
            confidence: FAIL_OPEN_CONFIDENCE,
        }
    }
}

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Classifier unreachable: {0}")]
    Unavailable(String),
    #[error("Malformed classifier response: {0}")]
    Malformed(String),
}

/// External content classifier contract: `{isClean, category, confidence}`
#[async_trait]
pub trait ImageClassifier: Send + Sync {
    async fn classify(&self, image_ref: &str) -> Result<ClassifierVerdict, ClassifierError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierVerdict {
    pub is_clean: bool,
    pub category: Option<String>,
    pub confidence: f32,
}

/// HTTP classifier client with a hard per-request timeout
pub struct HttpImageClassifier {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassifyRequest<'a> {
    image_ref: &'a str,
}

impl HttpImageClassifier {
    pub fn new(config: &ModerationConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .unwrap_or_default();

        Self {
            client,
            endpoint: config.classifier_endpoint.clone(),
        }
    }
}

#[async_trait]
impl ImageClassifier for HttpImageClassifier {
    async fn classify(&self, image_ref: &str) -> Result<ClassifierVerdict, ClassifierError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ClassifyRequest { image_ref })
            .send()
            .await
            .map_err(|e| ClassifierError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ClassifierError::Unavailable(format!(
                "status {}",
                response.status()
            )));
        }

        let verdict: ClassifierVerdict = response
            .json()
            .await
            .map_err(|e| ClassifierError::Malformed(e.to_string()))?;

        if !verdict.confidence.is_finite() || !(0.0..=1.0).contains(&verdict.confidence) {
            return Err(ClassifierError::Malformed(format!(
                "confidence out of range: {}",
                verdict.confidence
            )));
        }

        Ok(verdict)
    }
}

pub struct ModerationGate {
    banned_terms: Vec<String>,
    classifier: Option<Arc<dyn ImageClassifier>>,
}

impl ModerationGate {
    pub fn new(classifier: Option<Arc<dyn ImageClassifier>>) -> Self {
        Self {
            banned_terms: DEFAULT_BANNED_TERMS.iter().map(|t| t.to_string()).collect(),
            classifier,
        }
    }

    /// Replace the banned-term list (e.g. loaded from ops config)
    pub fn with_terms(mut self, terms: Vec<String>) -> Self {
        self.banned_terms = terms.into_iter().map(|t| t.to_lowercase()).collect();
        self
    }

    /// Run the gate over draft content. One classifier call at most, no
    /// retries; text rules are local and always apply.
    pub async fn check(&self, content: &DraftContent, mode: ModerationMode) -> ModerationVerdict {
        let text_verdict = content
            .text
            .as_deref()
            .map(|t| self.check_text(t))
            .unwrap_or_else(ModerationVerdict::clean_text);

        let image_verdict = match (mode, content.image_ref.as_deref()) {
            (ModerationMode::TextOnly, _) | (_, None) => None,
            (ModerationMode::Full, Some(image_ref)) => Some(self.check_image(image_ref).await),
        };

        combine(text_verdict, image_verdict)
    }

    /// Static text rules: banned-term substrings plus category patterns.
    /// Confidence grows with the number of distinct matches, capped below 1.0.
    pub fn check_text(&self, text: &str) -> ModerationVerdict {
        let normalized = text.to_lowercase();
        let mut matches = 0u32;
        let mut category: Option<String> = None;

        for term in &self.banned_terms {
            if normalized.contains(term.as_str()) {
                matches += 1;
                category.get_or_insert_with(|| "banned_term".to_string());
                debug!(term = %term, "banned term matched");
            }
        }

        for (name, pattern) in PATTERN_CHECKS.iter() {
            if pattern.is_match(&normalized) {
                matches += 1;
                // Pattern categories are more specific than banned_term
                if category.as_deref() == Some("banned_term") || category.is_none() {
                    category = Some((*name).to_string());
                }
                debug!(category = name, "pattern matched");
            }
        }

        if matches == 0 {
            return ModerationVerdict::clean_text();
        }

        ModerationVerdict {
            clean: false,
            category,
            confidence: 1.0 - 0.5f32.powi(matches as i32),
        }
    }

    async fn check_image(&self, image_ref: &str) -> ModerationVerdict {
        let Some(classifier) = &self.classifier else {
            warn!("no image classifier configured, failing open");
            return ModerationVerdict::fail_open();
        };

        match classifier.classify(image_ref).await {
            Ok(verdict) => ModerationVerdict {
                clean: verdict.is_clean,
                category: verdict.category,
                confidence: verdict.confidence,
            },
            Err(e) => {
                warn!(error = %e, "image classifier unavailable, failing open");
                ModerationVerdict::fail_open()
            }
        }
    }
}

/// Combined result: unclean if either check is unclean, confidence is the
/// max of the two, category prefers the image classifier's when both fire.
fn combine(text: ModerationVerdict, image: Option<ModerationVerdict>) -> ModerationVerdict {
    let Some(image) = image else { return text };

    let clean = text.clean && image.clean;
    let confidence = text.confidence.max(image.confidence);
    let category = match (text.clean, image.clean) {
        (false, false) => image.category.or(text.category),
        (false, true) => text.category,
        (true, false) => image.category,
        (true, true) => None,
    };

    ModerationVerdict {
        clean,
        category,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClassifier(ClassifierVerdict);

    #[async_trait]
    impl ImageClassifier for FixedClassifier {
        async fn classify(&self, _image_ref: &str) -> Result<ClassifierVerdict, ClassifierError> {
            Ok(self.0.clone())
        }
    }

    struct DownClassifier;

    #[async_trait]
    impl ImageClassifier for DownClassifier {
        async fn classify(&self, _image_ref: &str) -> Result<ClassifierVerdict, ClassifierError> {
            Err(ClassifierError::Unavailable("connection refused".into()))
        }
    }

    fn draft(text: &str, image: Option<&str>) -> DraftContent {
        DraftContent {
            text: Some(text.to_string()),
            image_ref: image.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_clean_text_passes() {
        let gate = ModerationGate::new(None);
        let verdict = gate
            .check(&draft("lovely sunset today", None), ModerationMode::TextOnly)
            .await;
        assert!(verdict.clean);
        assert!(verdict.category.is_none());
    }

    #[tokio::test]
    async fn test_banned_term_flags() {
        let gate = ModerationGate::new(None);
        let verdict = gate
            .check(&draft("check out my nude pics", None), ModerationMode::TextOnly)
            .await;
        assert!(!verdict.clean);
        assert_eq!(verdict.category.as_deref(), Some("banned_term"));
        assert!(verdict.confidence > 0.0 && verdict.confidence < 1.0);
    }

    #[tokio::test]
    async fn test_matching_is_case_insensitive() {
        let gate = ModerationGate::new(None);
        let verdict = gate
            .check(&draft("NUDE", None), ModerationMode::TextOnly)
            .await;
        assert!(!verdict.clean);
    }

    #[tokio::test]
    async fn test_pattern_category_reported() {
        let gate = ModerationGate::new(None);
        let verdict = gate
            .check(&draft("where can i buy drugs", None), ModerationMode::TextOnly)
            .await;
        assert!(!verdict.clean);
        assert_eq!(verdict.category.as_deref(), Some("drugs"));
    }

    #[tokio::test]
    async fn test_confidence_scales_with_matches_capped_below_one() {
        let gate = ModerationGate::new(None);
        let one = gate.check_text("nude");
        let many = gate.check_text("nude nudes suicide cocaine");
        assert!(many.confidence > one.confidence);
        assert!(many.confidence < 1.0);
    }

    #[tokio::test]
    async fn test_fail_open_on_unreachable_classifier() {
        let gate = ModerationGate::new(Some(Arc::new(DownClassifier)));
        let verdict = gate
            .check(
                &draft("a perfectly fine caption", Some("media/abc.jpg")),
                ModerationMode::Full,
            )
            .await;
        assert!(verdict.clean);
        assert_eq!(verdict.confidence, FAIL_OPEN_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_unclean_image_blocks() {
        let gate = ModerationGate::new(Some(Arc::new(FixedClassifier(ClassifierVerdict {
            is_clean: false,
            category: Some("nudity".into()),
            confidence: 0.93,
        }))));
        let verdict = gate
            .check(&draft("fine text", Some("media/abc.jpg")), ModerationMode::Full)
            .await;
        assert!(!verdict.clean);
        assert_eq!(verdict.category.as_deref(), Some("nudity"));
    }

    #[tokio::test]
    async fn test_combined_takes_max_confidence_and_image_category() {
        let gate = ModerationGate::new(Some(Arc::new(FixedClassifier(ClassifierVerdict {
            is_clean: false,
            category: Some("nudity".into()),
            confidence: 0.9,
        }))));
        let verdict = gate
            .check(&draft("nude", Some("media/abc.jpg")), ModerationMode::Full)
            .await;
        assert!(!verdict.clean);
        // Both fired: image category wins, confidence is the max
        assert_eq!(verdict.category.as_deref(), Some("nudity"));
        assert!((verdict.confidence - 0.9).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_text_only_mode_never_calls_classifier() {
        // A classifier that would flag everything; TextOnly must ignore it
        let gate = ModerationGate::new(Some(Arc::new(FixedClassifier(ClassifierVerdict {
            is_clean: false,
            category: Some("nudity".into()),
            confidence: 1.0,
        }))));
        let verdict = gate
            .check(&draft("hello", Some("media/abc.jpg")), ModerationMode::TextOnly)
            .await;
        assert!(verdict.clean);
    }
}
