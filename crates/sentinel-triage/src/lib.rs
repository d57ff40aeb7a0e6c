//! Urgency triage
//!
//! Scores a message by how many distinct urgency keywords it contains.
//! Matching is a case-insensitive substring scan; each distinct keyword
//! adds 25 points, capped at 100.
//!
//! ```rust
//! use sentinel_triage::{analyze_text_urgency, UrgencyLevel};
//!
//! let report = analyze_text_urgency(
//!     "this is an emergency, please help now",
//!     &["emergency", "urgent", "help"],
//! )
//! .unwrap();
//!
//! assert_eq!(report.score, 50);
//! assert_eq!(report.level, UrgencyLevel::High);
//! assert!(report.is_urgent);
//! assert_eq!(report.matched_keywords, vec!["emergency", "help"]);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest content accepted, in bytes
pub const MAX_CONTENT_BYTES: usize = 64 * 1024;

/// Points per distinct matched keyword
pub const POINTS_PER_MATCH: u8 = 25;

/// Keyword set used when the caller brings none
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "emergency",
    "urgent",
    "asap",
    "immediately",
    "critical",
    "help",
    "outage",
    "down",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TriageError {
    #[error("invalid triage input: {0}")]
    InvalidInput(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UrgencyLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl UrgencyLevel {
    /// >=90 CRITICAL, >=50 HIGH, >=25 MEDIUM, else LOW
    pub fn from_score(score: u8) -> Self {
        match score {
            90.. => UrgencyLevel::Critical,
            50.. => UrgencyLevel::High,
            25.. => UrgencyLevel::Medium,
            _ => UrgencyLevel::Low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrgencyReport {
    pub is_urgent: bool,
    /// 0 to 100
    pub score: u8,
    pub level: UrgencyLevel,
    /// Distinct matches in keyword order, spelled as first given
    pub matched_keywords: Vec<String>,
}

/// Score `content` against `keywords`
///
/// Keywords differing only by case count once. Fails on a blank keyword or
/// content larger than [`MAX_CONTENT_BYTES`].
pub fn analyze_text_urgency<K: AsRef<str>>(
    content: &str,
    keywords: &[K],
) -> Result<UrgencyReport, TriageError> {
    if content.len() > MAX_CONTENT_BYTES {
        return Err(TriageError::InvalidInput(format!(
            "content is {} bytes, limit is {}",
            content.len(),
            MAX_CONTENT_BYTES
        )));
    }

    let haystack = content.to_lowercase();
    let mut seen: Vec<String> = Vec::with_capacity(keywords.len());
    let mut matched_keywords = Vec::new();

    for (index, keyword) in keywords.iter().enumerate() {
        let keyword = keyword.as_ref();
        if keyword.trim().is_empty() {
            return Err(TriageError::InvalidInput(format!(
                "keyword {} is blank",
                index
            )));
        }

        let needle = keyword.to_lowercase();
        if seen.contains(&needle) {
            continue;
        }
        if haystack.contains(&needle) {
            matched_keywords.push(keyword.to_string());
        }
        seen.push(needle);
    }

    let score = matched_keywords
        .len()
        .saturating_mul(POINTS_PER_MATCH as usize)
        .min(100) as u8;

    Ok(UrgencyReport {
        is_urgent: score >= POINTS_PER_MATCH,
        score,
        level: UrgencyLevel::from_score(score),
        matched_keywords,
    })
}
