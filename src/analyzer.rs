//! # Analyzer Module
//!
//! Sends search material to a generative model and classifies what comes back.
//!
//! The model sits behind the [`LanguageModel`] trait. [`GeminiModel`] is the
//! production implementation: a `generateContent` call built from Rig's
//! Gemini wire types with a fixed generation policy. [`LlmAnalyzer`] owns the prompt templates and the
//! keyword classifier, and turns model failures into placeholder text so the
//! rest of the pipeline never sees an error.

use async_trait::async_trait;
use rig::providers::gemini::completion::gemini_api_types::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
    HarmBlockThreshold, HarmCategory, Part, PartKind, Role, SafetySetting,
};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::search::SearchResult;

// =============================================================================
// GENERATION POLICY
// =============================================================================
const TEMPERATURE: f64 = 0.3;
const TOP_P: f64 = 0.8;
const TOP_K: i32 = 40;
const MAX_OUTPUT_TOKENS: u64 = 2048;

// Each category is blocked at BLOCK_MEDIUM_AND_ABOVE.
const SAFETY_CATEGORIES: [HarmCategory; 4] = [
    HarmCategory::HarmCategoryHarassment,
    HarmCategory::HarmCategoryHateSpeech,
    HarmCategory::HarmCategorySexuallyExplicit,
    HarmCategory::HarmCategoryDangerousContent,
];

const NO_SOCIAL_CONTENT: &str = "No social media or blog content found.";

// =============================================================================
// CLASSIFICATION KEYWORDS
// =============================================================================
// Checked in order; the first group with a hit wins.
const INVESTOR_TERMS: [&str; 4] = ["investor", "venture capital", "vc", "investment"];
const FOUNDER_TERMS: [&str; 3] = ["founder", "ceo", "co-founder"];
const EXECUTIVE_TERMS: [&str; 4] = ["executive", "cto", "cfo", "vp"];

const VC_FIRM_TERMS: [&str; 3] = ["venture capital", "vc firm", "investment fund"];
const STARTUP_TERMS: [&str; 2] = ["startup", "early stage"];

// =============================================================================
// TYPES
// =============================================================================
/// Coarse category assigned to a person or company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
    Investor,
    Founder,
    Executive,
    Professional,
    VcFirm,
    Startup,
    Company,
    Unknown,
}

impl SubjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectType::Investor => "investor",
            SubjectType::Founder => "founder",
            SubjectType::Executive => "executive",
            SubjectType::Professional => "professional",
            SubjectType::VcFirm => "vc_firm",
            SubjectType::Startup => "startup",
            SubjectType::Company => "company",
            SubjectType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SubjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model prose plus the category derived from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub analysis: String,
    #[serde(rename = "type")]
    pub subject_type: SubjectType,
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("{0}")]
    Model(String),

    #[error("Gemini request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Gemini API error {0}: {1}")]
    Http(u16, String),

    #[error("model returned an empty response")]
    EmptyResponse,
}

// =============================================================================
// MODEL TRAIT
// =============================================================================
/// A text-in, text-out generative model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AnalysisError>;

    fn name(&self) -> &str;
}

// =============================================================================
// GEMINI MODEL
// =============================================================================
const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Gemini `generateContent` with the fixed generation policy above.
///
/// # Rust Concept: Borrowing Wire Types
///
/// Rig's agent builder cannot carry safety settings, so the request is sent
/// with reqwest directly. The body and response still use Rig's typed Gemini
/// API structs, which keeps the field names in one place.
pub struct GeminiModel {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiModel {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.gemini_api_key.clone(),
            base_url: GEMINI_API_BASE_URL.to_string(),
            model: config.model.clone(),
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

fn generation_config() -> GenerationConfig {
    GenerationConfig {
        temperature: Some(TEMPERATURE),
        top_p: Some(TOP_P),
        top_k: Some(TOP_K),
        max_output_tokens: Some(MAX_OUTPUT_TOKENS),
        ..Default::default()
    }
}

fn safety_settings() -> Vec<SafetySetting> {
    SAFETY_CATEGORIES
        .iter()
        .map(|category| SafetySetting {
            category: category.clone(),
            threshold: HarmBlockThreshold::BlockMediumAndAbove,
        })
        .collect()
}

/// Single-turn request body for `prompt`.
fn request_body(prompt: &str) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            parts: vec![Part {
                part: PartKind::Text(prompt.to_string()),
                ..Default::default()
            }],
            role: Some(Role::User),
        }],
        tools: None,
        tool_config: None,
        generation_config: Some(generation_config()),
        safety_settings: Some(safety_settings()),
        system_instruction: None,
        additional_params: None,
    }
}

/// Text of the first candidate, skipping thought parts.
fn response_text(response: &GenerateContentResponse) -> String {
    response
        .candidates
        .first()
        .and_then(|candidate| candidate.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter(|part| part.thought != Some(true))
                .filter_map(|part| match &part.part {
                    PartKind::Text(text) => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

#[async_trait]
impl LanguageModel for GeminiModel {
    async fn generate(&self, prompt: &str) -> Result<String, AnalysisError> {
        debug!(model = %self.model, prompt_chars = prompt.len(), "Sending prompt to Gemini");

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .json(&request_body(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Http(status.as_u16(), body));
        }

        let body: GenerateContentResponse = response.json().await?;
        let text = response_text(&body);
        if text.trim().is_empty() {
            return Err(AnalysisError::EmptyResponse);
        }
        Ok(text)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// =============================================================================
// ANALYZER
// =============================================================================
/// Builds prompts from search results and classifies the answers.
pub struct LlmAnalyzer {
    model: Box<dyn LanguageModel>,
}

impl LlmAnalyzer {
    pub fn new(model: Box<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Analyze a person in the context of their company.
    pub async fn analyze_person(
        &self,
        name: &str,
        company: &str,
        results: &[SearchResult],
    ) -> AnalysisResult {
        info!(person = %name, sources = results.len(), "Analyzing person data");
        let prompt = person_prompt(name, company, &combine_search_results(results));

        match self.model.generate(&prompt).await {
            Ok(text) => {
                let subject_type = classify_person(&text);
                AnalysisResult {
                    analysis: text,
                    subject_type,
                }
            }
            Err(e) => {
                warn!(person = %name, model = self.model.name(), error = %e, "Person analysis failed");
                failed_analysis("person", &e)
            }
        }
    }

    /// Analyze a company, optionally noting the person associated with it.
    pub async fn analyze_company(
        &self,
        company: &str,
        results: &[SearchResult],
        person: Option<&str>,
    ) -> AnalysisResult {
        info!(company = %company, sources = results.len(), "Analyzing company data");
        let prompt = company_prompt(company, &combine_search_results(results), person);

        match self.model.generate(&prompt).await {
            Ok(text) => {
                let subject_type = classify_company(&text);
                AnalysisResult {
                    analysis: text,
                    subject_type,
                }
            }
            Err(e) => {
                warn!(company = %company, model = self.model.name(), error = %e, "Company analysis failed");
                failed_analysis("company", &e)
            }
        }
    }

    /// Summarize opinions found in social posts and articles.
    ///
    /// Skips the model entirely when there is nothing to read.
    pub async fn analyze_social(&self, name: &str, results: &[SearchResult]) -> String {
        let content = combine_search_results(results);
        if content.trim().is_empty() {
            info!(person = %name, "No social content to analyze");
            return NO_SOCIAL_CONTENT.to_string();
        }

        info!(person = %name, sources = results.len(), "Extracting opinions and insights");
        match self.model.generate(&social_prompt(name, &content)).await {
            Ok(text) => text,
            Err(e) => {
                warn!(person = %name, model = self.model.name(), error = %e, "Social analysis failed");
                format!("Error analyzing social content: {}", e)
            }
        }
    }
}

fn failed_analysis(subject: &str, error: &AnalysisError) -> AnalysisResult {
    AnalysisResult {
        analysis: format!("Error analyzing {} data: {}", subject, error),
        subject_type: SubjectType::Unknown,
    }
}

/// Flatten results into the block embedded in every prompt.
pub fn combine_search_results(results: &[SearchResult]) -> String {
    let separator = "-".repeat(50);
    results
        .iter()
        .map(|r| {
            format!(
                "Title: {}\nContent: {}\nSource: {}\n{}\n",
                r.title, r.content, r.url, separator
            )
        })
        .collect()
}

// =============================================================================
// CLASSIFICATION
// =============================================================================
fn contains_any(haystack: &str, terms: &[&str]) -> bool {
    terms.iter().any(|term| haystack.contains(term))
}

/// Plain substring matching, so short terms like "vc" also hit inside longer
/// words.
pub fn classify_person(analysis: &str) -> SubjectType {
    let text = analysis.to_lowercase();
    if contains_any(&text, &INVESTOR_TERMS) {
        SubjectType::Investor
    } else if contains_any(&text, &FOUNDER_TERMS) {
        SubjectType::Founder
    } else if contains_any(&text, &EXECUTIVE_TERMS) {
        SubjectType::Executive
    } else {
        SubjectType::Professional
    }
}

pub fn classify_company(analysis: &str) -> SubjectType {
    let text = analysis.to_lowercase();
    if contains_any(&text, &VC_FIRM_TERMS) {
        SubjectType::VcFirm
    } else if contains_any(&text, &STARTUP_TERMS) {
        SubjectType::Startup
    } else {
        SubjectType::Company
    }
}

// =============================================================================
// PROMPTS
// =============================================================================
fn person_prompt(name: &str, company: &str, content: &str) -> String {
    format!(
        r#"Analyze the following information about {name} from {company}:

{content}

Extract and provide:
1. Professional Background (role, experience, education)
2. Key Achievements and Notable Work
3. Investment Focus Areas (if they're an investor)
4. Opinions and Viewpoints (from blogs, tweets, interviews)
5. Industry Expertise and Interests
6. Recent Activities and News

Format your response as a structured analysis focusing on insights that would be valuable for a business meeting.
Be concise but comprehensive. If this person is an investor, focus on their investment thesis and portfolio companies."#
    )
}

fn company_prompt(company: &str, content: &str, person: Option<&str>) -> String {
    let association = person
        .map(|p| format!("Note: {} is associated with this company.\n\n", p))
        .unwrap_or_default();

    format!(
        r#"Analyze the following information about {company}:

{content}

Extract and provide:
1. Company Overview (what they do, business model)
2. Industry and Market Position
3. Key Products/Services
4. Funding and Investment History (if available)
5. Recent News and Developments
6. Company Culture and Values
7. If it's a VC firm: Investment Focus Areas and Portfolio Companies

{association}Format as a structured business analysis. Focus on information relevant for understanding the company's strategy and market position."#
    )
}

fn social_prompt(name: &str, content: &str) -> String {
    format!(
        r#"Analyze the following social media posts, blog articles, and public statements by {name}:

{content}

Extract:
1. Key Opinions and Viewpoints
2. Industry Perspectives and Predictions
3. Investment Philosophy (if applicable)
4. Recent Thoughts and Commentary
5. Areas of Expertise and Interest

Focus on understanding their thought process, priorities, and professional perspectives.
This analysis will help in preparing for a business meeting with this person."#
    )
}


#[cfg(test)]
mod http_tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn model_for(server: &MockServer) -> GeminiModel {
        let config = Config {
            gemini_api_key: "test-gemini-key".to_string(),
            model: "gemini-test".to_string(),
            ..Config::default()
        };
        GeminiModel::new(&config).with_base_url(&server.uri())
    }

    fn reply(parts: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "responseId": "resp-1",
            "candidates": [{
                "content": { "role": "model", "parts": parts },
                "finishReason": "STOP"
            }]
        })
    }

    #[tokio::test]
    async fn test_generate_sends_policy_and_reads_text() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-test:generateContent"))
            .and(query_param("key", "test-gemini-key"))
            .and(body_partial_json(serde_json::json!({
                "generationConfig": { "topK": 40, "maxOutputTokens": 2048 },
                "safetySettings": [
                    { "category": "HARM_CATEGORY_HARASSMENT", "threshold": "BLOCK_MEDIUM_AND_ABOVE" },
                    { "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": "BLOCK_MEDIUM_AND_ABOVE" },
                    { "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": "BLOCK_MEDIUM_AND_ABOVE" },
                    { "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": "BLOCK_MEDIUM_AND_ABOVE" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply(serde_json::json!([
                { "text": "Jane is the " },
                { "text": "CEO of Acme." }
            ]))))
            .expect(1)
            .mount(&mock_server)
            .await;

        let text = model_for(&mock_server).generate("Who is Jane?").await.unwrap();

        assert_eq!(text, "Jane is the CEO of Acme.");
    }

    #[tokio::test]
    async fn test_generate_skips_thought_parts() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply(serde_json::json!([
                { "text": "planning...", "thought": true },
                { "text": "Final answer." }
            ]))))
            .mount(&mock_server)
            .await;

        let text = model_for(&mock_server).generate("q").await.unwrap();

        assert_eq!(text, "Final answer.");
    }

    #[tokio::test]
    async fn test_generate_empty_reply_is_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(reply(serde_json::json!([{ "text": "  " }]))),
            )
            .mount(&mock_server)
            .await;

        let err = model_for(&mock_server).generate("q").await.unwrap_err();

        assert!(matches!(err, AnalysisError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_generate_http_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .mount(&mock_server)
            .await;

        let err = model_for(&mock_server).generate("q").await.unwrap_err();

        assert!(matches!(err, AnalysisError::Http(400, ref body) if body == "bad request"));
        assert_eq!(err.to_string(), "Gemini API error 400: bad request");
    }
}
