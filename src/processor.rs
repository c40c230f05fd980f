//! # Processor Module
//!
//! Post-processing of model output and raw search snippets:
//! - text normalization for display
//! - key-point and opinion extraction from free-form analysis prose
//! - contact-handle extraction from search results
//! - assembly of the processed entities the report is rendered from
//!
//! Extraction is regex based and tied to the phrasing the model tends to
//! produce. It sits behind the [`Extractor`] trait so another strategy can be
//! dropped in without changing [`DataProcessor`] callers.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;

use crate::analyzer::{AnalysisResult, SubjectType};
use crate::search::SearchResult;

// =============================================================================
// LIMITS
// =============================================================================
const MAX_KEY_POINTS: usize = 5;
const KEY_POINT_MIN_EXCLUSIVE: usize = 10;
const KEY_POINT_MAX_EXCLUSIVE: usize = 200;

const MAX_OPINIONS: usize = 3;
const OPINION_MIN_EXCLUSIVE: usize = 15;
const OPINION_MAX_EXCLUSIVE: usize = 150;

const MAX_CONTACTS_PER_KIND: usize = 3;

// =============================================================================
// PATTERNS
// =============================================================================
lazy_static! {
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();

    // Whitespace stays in the allow-set so that removal never glues words
    // together; runs are collapsed afterwards.
    static ref DISALLOWED_CHAR: Regex = Regex::new(r#"[^\w\s.,!?\-:;()"'/]"#).unwrap();

    // "1. text" up to a period that ends the sentence. A period followed by a
    // digit (the next list number) or a line break closes the item.
    static ref NUMBERED_ITEM: Regex =
        Regex::new(r"\d+\.\s+([^.\r\n]+(?:\.[^\S\r\n]*[^\d\s.][^.\r\n]*)*)").unwrap();

    static ref BULLET_ITEM: Regex = Regex::new(r"(?m)^[ \t]*[-*•][ \t]+([^\r\n]+)").unwrap();

    static ref OPINION_PATTERNS: Vec<Regex> = [
        r"(?i)believes?\s+that\s+([^.]+)",
        r"(?i)thinks?\s+([^.]+)",
        r"(?i)opinion\s+(?:is\s+)?(?:that\s+)?([^.]+)",
        r"(?i)view\s+(?:is\s+)?(?:that\s+)?([^.]+)",
        r"(?i)perspective\s+(?:is\s+)?(?:that\s+)?([^.]+)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect();

    static ref TWITTER_HANDLE: Regex = Regex::new(r"@([a-zA-Z0-9_]+)").unwrap();
    static ref LINKEDIN_SLUG: Regex = Regex::new(r"linkedin\.com/in/([a-zA-Z0-9\-]+)").unwrap();
    static ref EMAIL_ADDRESS: Regex =
        Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap();
}

const WEBSITE_MARKERS: [&str; 3] = [".com", ".org", ".net"];
const SOCIAL_HOSTS: [&str; 3] = ["twitter", "linkedin", "facebook"];

// =============================================================================
// TEXT NORMALIZER
// =============================================================================
/// Clean model output for display.
///
/// Drops characters outside the allow-set (word characters, whitespace and
/// `. , ! ? - : ; ( ) " ' /`), collapses whitespace runs to one space and
/// trims the ends. Total over all inputs and idempotent.
pub fn normalize_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let kept = DISALLOWED_CHAR.replace_all(text, "");
    let collapsed = WHITESPACE_RUN.replace_all(&kept, " ");
    collapsed.trim().to_string()
}

// =============================================================================
// EXTRACTION STRATEGY
// =============================================================================
/// Pulls structured statements out of analysis prose.
pub trait Extractor: Send + Sync {
    /// Up to five enumerated or bulleted statements, in discovery order.
    fn key_points(&self, analysis: &str) -> Vec<String>;

    /// Up to three distinct opinion clauses.
    fn opinions(&self, insights: &str) -> Vec<String>;
}

/// Regex-based [`Extractor`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexExtractor;

impl Extractor for RegexExtractor {
    fn key_points(&self, analysis: &str) -> Vec<String> {
        if analysis.is_empty() {
            return Vec::new();
        }

        // Numbered items first, then bullets.
        let numbered = NUMBERED_ITEM.captures_iter(analysis);
        let bullets = BULLET_ITEM.captures_iter(analysis);

        numbered
            .chain(bullets)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .filter(|point| {
                within(
                    point.chars().count(),
                    KEY_POINT_MIN_EXCLUSIVE,
                    KEY_POINT_MAX_EXCLUSIVE,
                )
            })
            .take(MAX_KEY_POINTS)
            .map(str::to_string)
            .collect()
    }

    fn opinions(&self, insights: &str) -> Vec<String> {
        if insights.is_empty() {
            return Vec::new();
        }

        let mut opinions: Vec<String> = Vec::new();
        for pattern in OPINION_PATTERNS.iter() {
            for caps in pattern.captures_iter(insights) {
                let Some(clause) = caps.get(1) else { continue };
                let clause = clause.as_str().trim();
                if !within(
                    clause.chars().count(),
                    OPINION_MIN_EXCLUSIVE,
                    OPINION_MAX_EXCLUSIVE,
                ) {
                    continue;
                }
                if !opinions.iter().any(|seen| seen == clause) {
                    opinions.push(clause.to_string());
                }
            }
        }

        opinions.truncate(MAX_OPINIONS);
        opinions
    }
}

fn within(len: usize, min_exclusive: usize, max_exclusive: usize) -> bool {
    len > min_exclusive && len < max_exclusive
}

// =============================================================================
// CONTACT INFO
// =============================================================================
/// Handles and addresses spotted in raw search results, at most three of each.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContactInfo {
    pub twitter: Vec<String>,
    pub linkedin: Vec<String>,
    pub email: Vec<String>,
    pub website: Vec<String>,
}

impl ContactInfo {
    pub fn is_empty(&self) -> bool {
        self.twitter.is_empty()
            && self.linkedin.is_empty()
            && self.email.is_empty()
            && self.website.is_empty()
    }
}

/// Scan each result's content and URL for contact details.
///
/// Duplicates collapse; when more than three distinct values exist the first
/// three in lexical order are kept.
pub fn extract_contact_info(results: &[SearchResult]) -> ContactInfo {
    let mut twitter = BTreeSet::new();
    let mut linkedin = BTreeSet::new();
    let mut email = BTreeSet::new();
    let mut website = BTreeSet::new();

    for result in results {
        let text = format!("{} {}", result.content, result.url);

        twitter.extend(capture_group(&TWITTER_HANDLE, &text));
        linkedin.extend(capture_group(&LINKEDIN_SLUG, &text));
        email.extend(EMAIL_ADDRESS.find_iter(&text).map(|m| m.as_str().to_string()));

        let looks_like_site = WEBSITE_MARKERS.iter().any(|marker| text.contains(marker));
        let is_social = SOCIAL_HOSTS.iter().any(|host| result.url.contains(host));
        if looks_like_site && !result.url.is_empty() && !is_social {
            website.insert(result.url.clone());
        }
    }

    ContactInfo {
        twitter: first_n(twitter),
        linkedin: first_n(linkedin),
        email: first_n(email),
        website: first_n(website),
    }
}

fn capture_group<'a>(pattern: &'a Regex, text: &'a str) -> impl Iterator<Item = String> + 'a {
    pattern
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
}

fn first_n(values: BTreeSet<String>) -> Vec<String> {
    values.into_iter().take(MAX_CONTACTS_PER_KIND).collect()
}

// =============================================================================
// PROCESSED DATA
// =============================================================================
/// Everything gathered during one research run, before processing.
#[derive(Debug, Clone)]
pub struct RawResearch {
    pub person_name: String,
    pub company_name: String,
    pub person_analysis: AnalysisResult,
    pub person_results: Vec<SearchResult>,
    pub company_analysis: AnalysisResult,
    pub company_results: Vec<SearchResult>,
    pub insights: String,
    pub social_results: Vec<SearchResult>,
}

/// A person or company, cleaned up for the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedEntity {
    pub name: String,
    /// Affiliation, set for the person entity only
    pub company: Option<String>,
    #[serde(rename = "type")]
    pub subject_type: SubjectType,
    pub analysis: String,
    pub key_points: Vec<String>,
    pub sources_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedInsights {
    pub insights: String,
    pub key_opinions: Vec<String>,
    pub sources_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResearchMetadata {
    pub processed_at: DateTime<Utc>,
    pub total_sources: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedResearch {
    pub person: ProcessedEntity,
    pub company: ProcessedEntity,
    pub insights: ProcessedInsights,
    pub contact_info: ContactInfo,
    pub metadata: ResearchMetadata,
}

// =============================================================================
// DATA PROCESSOR
// =============================================================================
/// Turns a [`RawResearch`] into the [`ProcessedResearch`] the report uses.
pub struct DataProcessor {
    extractor: Box<dyn Extractor>,
}

impl Default for DataProcessor {
    fn default() -> Self {
        Self::new(Box::new(RegexExtractor))
    }
}

impl DataProcessor {
    pub fn new(extractor: Box<dyn Extractor>) -> Self {
        Self { extractor }
    }

    pub fn key_points(&self, analysis: &str) -> Vec<String> {
        self.extractor.key_points(analysis)
    }

    pub fn opinions(&self, insights: &str) -> Vec<String> {
        self.extractor.opinions(insights)
    }

    pub fn process(&self, raw: &RawResearch) -> ProcessedResearch {
        let person = self.entity(
            &raw.person_name,
            Some(&raw.company_name),
            &raw.person_analysis,
            raw.person_results.len(),
        );
        let company = self.entity(
            &raw.company_name,
            None,
            &raw.company_analysis,
            raw.company_results.len(),
        );

        let insights = ProcessedInsights {
            insights: normalize_text(&raw.insights),
            key_opinions: self.opinions(&raw.insights),
            sources_count: raw.social_results.len(),
        };

        let all_results: Vec<SearchResult> = raw
            .person_results
            .iter()
            .chain(&raw.company_results)
            .chain(&raw.social_results)
            .cloned()
            .collect();

        ProcessedResearch {
            person,
            company,
            insights,
            contact_info: extract_contact_info(&all_results),
            metadata: ResearchMetadata {
                processed_at: Utc::now(),
                total_sources: all_results.len(),
            },
        }
    }

    /// Key points are read from the raw analysis, since normalization strips
    /// the line structure bullets depend on.
    fn entity(
        &self,
        name: &str,
        company: Option<&str>,
        analysis: &AnalysisResult,
        sources_count: usize,
    ) -> ProcessedEntity {
        ProcessedEntity {
            name: name.to_string(),
            company: company.map(str::to_string),
            subject_type: analysis.subject_type,
            analysis: normalize_text(&analysis.analysis),
            key_points: self.key_points(&analysis.analysis),
            sources_count,
        }
    }
}
