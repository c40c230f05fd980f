//! # Agent Module
//!
//! The research agent ties the collaborators together:
//! search → model analysis → processing → report.
//!
//! Every step runs to completion before the next one starts. Collaborator
//! failures have already been turned into empty results or placeholder text by
//! the time they reach this module, so a run always produces a report.

use clap::ValueEnum;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::analyzer::{GeminiModel, LlmAnalyzer, SubjectType};
use crate::config::Config;
use crate::processor::{DataProcessor, ProcessedResearch, RawResearch};
use crate::report::{ReportError, ReportGenerator};
use crate::search::{JinaSearch, SearchError, WebSearchTool};

/// Results handed to the model in quick mode, per subject
const QUICK_RESULT_LIMIT: usize = 3;

// =============================================================================
// RESEARCH MODE
// =============================================================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ResearchMode {
    /// Person, company and social research with a full report
    #[default]
    Full,
    /// Person and company only, fewer sources
    Quick,
    /// Investment thesis, portfolio and opinions
    Investor,
}

impl ResearchMode {
    /// Interactive menu choice: `1`, `2` or `3`; anything else means full.
    pub fn from_choice(choice: &str) -> Self {
        match choice.trim() {
            "2" => ResearchMode::Quick,
            "3" => ResearchMode::Investor,
            _ => ResearchMode::Full,
        }
    }
}

impl fmt::Display for ResearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResearchMode::Full => "full",
            ResearchMode::Quick => "quick",
            ResearchMode::Investor => "investor",
        };
        f.write_str(name)
    }
}

/// What a research run produced.
#[derive(Debug, Clone)]
pub struct ResearchOutcome {
    pub report: String,
    pub person_type: SubjectType,
    /// Not assessed in investor mode
    pub company_type: Option<SubjectType>,
    /// Only full mode runs the processor over all three analyses
    pub processed: Option<ProcessedResearch>,
}

// =============================================================================
// RESEARCH AGENT STRUCT
// =============================================================================
pub struct ResearchAgent {
    search: WebSearchTool,
    analyzer: LlmAnalyzer,
    processor: DataProcessor,
    reports: ReportGenerator,
}

impl ResearchAgent {
    /// Wire up the production collaborators (Jina search, Gemini).
    pub fn new(config: &Config) -> Result<Self, SearchError> {
        let backend = JinaSearch::new(config)?;
        Ok(Self::with_components(
            WebSearchTool::new(Box::new(backend), config),
            LlmAnalyzer::new(Box::new(GeminiModel::new(config))),
            ReportGenerator::new(config),
        ))
    }

    pub fn with_components(
        search: WebSearchTool,
        analyzer: LlmAnalyzer,
        reports: ReportGenerator,
    ) -> Self {
        Self {
            search,
            analyzer,
            processor: DataProcessor::default(),
            reports,
        }
    }

    pub async fn run(&self, mode: ResearchMode, person: &str, company: &str) -> ResearchOutcome {
        match mode {
            ResearchMode::Full => self.research(person, company).await,
            ResearchMode::Quick => self.quick_research(person, company).await,
            ResearchMode::Investor => self.research_investor(person, company).await,
        }
    }

    /// Full research on a person and their company.
    pub async fn research(&self, person: &str, company: &str) -> ResearchOutcome {
        info!(person = %person, company = %company, "Starting full research");

        info!("Searching for person information");
        let person_results = self.search.search_person(person, Some(company)).await;

        info!("Searching for company information");
        let company_results = self.search.search_company(company).await;

        info!("Searching for social content and opinions");
        let social_results = self.search.search_social_content(person).await;

        let person_analysis = self
            .analyzer
            .analyze_person(person, company, &person_results)
            .await;
        let company_analysis = self
            .analyzer
            .analyze_company(company, &company_results, Some(person))
            .await;
        let insights = self.analyzer.analyze_social(person, &social_results).await;

        let raw = RawResearch {
            person_name: person.to_string(),
            company_name: company.to_string(),
            person_analysis,
            person_results,
            company_analysis,
            company_results,
            insights,
            social_results,
        };
        let processed = self.processor.process(&raw);

        info!(
            total_sources = processed.metadata.total_sources,
            "Generating comprehensive report"
        );
        let report = self.reports.comprehensive(&processed);

        info!("Research completed");
        ResearchOutcome {
            report,
            person_type: processed.person.subject_type,
            company_type: Some(processed.company.subject_type),
            processed: Some(processed),
        }
    }

    /// Basic person and company profile from the top few sources.
    pub async fn quick_research(&self, person: &str, company: &str) -> ResearchOutcome {
        info!(person = %person, company = %company, "Starting quick research");

        let person_results = self.search.search_person(person, Some(company)).await;
        let company_results = self.search.search_company(company).await;

        let person_analysis = self
            .analyzer
            .analyze_person(person, company, head(&person_results))
            .await;
        let company_analysis = self
            .analyzer
            .analyze_company(company, head(&company_results), Some(person))
            .await;

        let report = self
            .reports
            .quick(person, company, &person_analysis, &company_analysis);

        ResearchOutcome {
            report,
            person_type: person_analysis.subject_type,
            company_type: Some(company_analysis.subject_type),
            processed: None,
        }
    }

    /// Investor-focused research on a person and their firm.
    pub async fn research_investor(&self, person: &str, firm: &str) -> ResearchOutcome {
        info!(person = %person, firm = %firm, "Starting investor research");

        let investor_results = self.search.search_investor(person, firm).await;
        let social_results = self.search.search_social_content(person).await;

        let analysis = self
            .analyzer
            .analyze_person(person, firm, &investor_results)
            .await;
        let insights = self.analyzer.analyze_social(person, &social_results).await;
        let opinions = self.processor.opinions(&insights);

        let report = self
            .reports
            .investor(person, firm, &analysis, &insights, &opinions);

        ResearchOutcome {
            report,
            person_type: analysis.subject_type,
            company_type: None,
            processed: None,
        }
    }

    pub fn save_report(
        &self,
        report: &str,
        subject: &str,
        output: Option<&Path>,
    ) -> Result<PathBuf, ReportError> {
        self.reports.save_report(report, subject, output)
    }
}

fn head<T>(items: &[T]) -> &[T] {
    &items[..items.len().min(QUICK_RESULT_LIMIT)]
}

// =============================================================================
// UNIT TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{AnalysisError, LanguageModel};
    use crate::search::{SearchBackend, SearchResult};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Returns the same results for every query.
    struct FixedBackend(Vec<SearchResult>);

    #[async_trait]
    impl SearchBackend for FixedBackend {
        async fn search(&self, _query: &str, max: usize) -> Result<Vec<SearchResult>, SearchError> {
            Ok(self.0.iter().take(max).cloned().collect())
        }
    }

    /// Replies with a fixed text and counts how much material each prompt had.
    struct EchoModel {
        reply: String,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl LanguageModel for EchoModel {
        async fn generate(&self, prompt: &str) -> Result<String, AnalysisError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    struct BrokenModel;

    #[async_trait]
    impl LanguageModel for BrokenModel {
        async fn generate(&self, _prompt: &str) -> Result<String, AnalysisError> {
            Err(AnalysisError::Model("503 Service Unavailable".to_string()))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    fn results(n: usize) -> Vec<SearchResult> {
        (0..n)
            .map(|i| SearchResult {
                title: format!("Result {}", i),
                content: format!("Contact @handle{} for details", i),
                url: format!("https://site{}.com", i),
            })
            .collect()
    }

    fn agent(results: Vec<SearchResult>, model: Box<dyn LanguageModel>) -> ResearchAgent {
        let config = Config::default();
        ResearchAgent::with_components(
            WebSearchTool::new(Box::new(FixedBackend(results)), &config),
            LlmAnalyzer::new(model),
            ReportGenerator::new(&config),
        )
    }

    fn echo(reply: &str) -> (Box<dyn LanguageModel>, Arc<Mutex<Vec<String>>>) {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let model = EchoModel {
            reply: reply.to_string(),
            prompts: Arc::clone(&prompts),
        };
        (Box::new(model), prompts)
    }

    #[test]
    fn test_mode_from_choice() {
        assert_eq!(ResearchMode::from_choice("1"), ResearchMode::Full);
        assert_eq!(ResearchMode::from_choice(" 2 "), ResearchMode::Quick);
        assert_eq!(ResearchMode::from_choice("3"), ResearchMode::Investor);
        assert_eq!(ResearchMode::from_choice(""), ResearchMode::Full);
        assert_eq!(ResearchMode::from_choice("9"), ResearchMode::Full);
        assert_eq!(ResearchMode::Investor.to_string(), "investor");
    }

    #[tokio::test]
    async fn test_full_research() {
        let (model, prompts) = echo(
            "1. Founded a venture capital fund in 2019. She believes that seed rounds are getting larger.",
        );
        let agent = agent(results(2), model);

        let outcome = agent.run(ResearchMode::Full, "Jane Doe", "Acme").await;

        assert_eq!(outcome.person_type, SubjectType::Investor);
        assert_eq!(outcome.company_type, Some(SubjectType::VcFirm));

        let processed = outcome.processed.expect("full mode processes data");
        // Every query sees the same two URLs, so each subject keeps two.
        assert_eq!(processed.person.sources_count, 2);
        assert_eq!(processed.company.sources_count, 2);
        assert_eq!(processed.insights.sources_count, 2);
        assert_eq!(processed.metadata.total_sources, 6);
        assert_eq!(
            processed.person.key_points,
            vec!["Founded a venture capital fund in 2019. She believes that seed rounds are getting larger".to_string()]
        );
        assert_eq!(
            processed.insights.key_opinions,
            vec!["seed rounds are getting larger".to_string()]
        );
        assert_eq!(processed.contact_info.twitter, vec!["handle0", "handle1"]);

        assert!(outcome.report.contains("# Research Report: Jane Doe (Acme)"));
        assert_eq!(prompts.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_full_research_without_sources() {
        let (model, prompts) = echo("A seasoned operator.");
        let agent = agent(Vec::new(), model);

        let outcome = agent.research("Jane Doe", "Acme").await;
        let processed = outcome.processed.unwrap();

        assert_eq!(processed.person.sources_count, 0);
        assert_eq!(processed.company.sources_count, 0);
        assert_eq!(processed.person.subject_type, SubjectType::Professional);
        assert_eq!(processed.insights.insights, "No social media or blog content found.");
        // Person and company are still analyzed; social is skipped.
        assert_eq!(prompts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failing_model_still_produces_report() {
        let agent = agent(results(1), Box::new(BrokenModel));

        let outcome = agent.research("Jane Doe", "Acme").await;

        assert_eq!(outcome.person_type, SubjectType::Unknown);
        assert_eq!(outcome.company_type, Some(SubjectType::Unknown));
        let processed = outcome.processed.unwrap();
        assert!(processed.person.analysis.contains("503 Service Unavailable"));
        assert!(outcome.report.contains("Error analyzing person data: 503 Service Unavailable"));
        assert!(outcome.report.contains("Error analyzing social content"));
    }

    #[tokio::test]
    async fn test_quick_research_limits_sources() {
        let (model, prompts) = echo("An early stage startup.");
        let agent = agent(results(5), model);

        let outcome = agent.run(ResearchMode::Quick, "Jane", "Acme").await;

        assert!(outcome.processed.is_none());
        assert_eq!(outcome.company_type, Some(SubjectType::Startup));
        assert!(outcome.report.starts_with("# Quick Research: Jane (Acme)"));

        let prompts = prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        for prompt in prompts.iter() {
            assert_eq!(prompt.matches("Source: ").count(), 3);
        }
    }

    #[tokio::test]
    async fn test_investor_research() {
        let (model, _) = echo("Partner at a VC firm. She thinks climate software is underfunded.");
        let agent = agent(results(2), model);

        let outcome = agent.run(ResearchMode::Investor, "Jane", "Fund").await;

        assert_eq!(outcome.person_type, SubjectType::Investor);
        assert_eq!(outcome.company_type, None);
        assert!(outcome.report.contains("# Investor Profile: Jane (Fund)"));
        assert!(outcome.report.contains("- climate software is underfunded"));
    }

    #[tokio::test]
    async fn test_save_report_through_agent() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.md");
        let (model, _) = echo("text");
        let agent = agent(Vec::new(), model);

        let path = agent.save_report("report body", "Jane", Some(&target)).unwrap();

        assert_eq!(std::fs::read_to_string(path).unwrap(), "report body");
    }
}
