//! # Report Module
//!
//! Renders research output as Markdown and writes it to disk on request.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::analyzer::AnalysisResult;
use crate::config::Config;
use crate::processor::{normalize_text, ContactInfo, ProcessedEntity, ProcessedResearch};

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write report to {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Formats reports for each research mode.
#[derive(Debug, Clone)]
pub struct ReportGenerator {
    output_dir: PathBuf,
}

impl ReportGenerator {
    pub fn new(config: &Config) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
        }
    }

    // =========================================================================
    // RENDERING
    // =========================================================================

    /// Full briefing: person, company, opinions, contact details and sources.
    pub fn comprehensive(&self, data: &ProcessedResearch) -> String {
        let mut out = header(
            &format!(
                "Research Report: {} ({})",
                data.person.name, data.company.name
            ),
            data.metadata.processed_at,
        );

        out.push_str("## Person Profile\n\n");
        out.push_str(&entity_section(&data.person));

        out.push_str("## Company Profile\n\n");
        out.push_str(&entity_section(&data.company));

        out.push_str("## Insights & Opinions\n\n");
        out.push_str(&bullet_list("Key opinions", &data.insights.key_opinions));
        out.push_str(&format!("{}\n\n", data.insights.insights));
        out.push_str(&format!(
            "_Social sources analyzed: {}_\n\n",
            data.insights.sources_count
        ));

        out.push_str("## Contact Information\n\n");
        out.push_str(&contact_section(&data.contact_info));

        out.push_str("## Sources\n\n");
        out.push_str(&format!(
            "- Person: {}\n- Company: {}\n- Social: {}\n- **Total: {}**\n",
            data.person.sources_count,
            data.company.sources_count,
            data.insights.sources_count,
            data.metadata.total_sources
        ));

        out
    }

    /// Short briefing built straight from the two analyses.
    pub fn quick(
        &self,
        person: &str,
        company: &str,
        person_analysis: &AnalysisResult,
        company_analysis: &AnalysisResult,
    ) -> String {
        let mut out = header(
            &format!("Quick Research: {} ({})", person, company),
            Utc::now(),
        );

        out.push_str(&format!(
            "## {}\n\n**Type:** {}\n\n{}\n\n",
            person,
            person_analysis.subject_type,
            normalize_text(&person_analysis.analysis)
        ));
        out.push_str(&format!(
            "## {}\n\n**Type:** {}\n\n{}\n",
            company,
            company_analysis.subject_type,
            normalize_text(&company_analysis.analysis)
        ));

        out
    }

    /// Investor-focused briefing: thesis and portfolio first, then opinions.
    pub fn investor(
        &self,
        person: &str,
        firm: &str,
        analysis: &AnalysisResult,
        insights: &str,
        opinions: &[String],
    ) -> String {
        let mut out = header(
            &format!("Investor Profile: {} ({})", person, firm),
            Utc::now(),
        );

        out.push_str(&format!(
            "## Investment Focus\n\n**Type:** {}\n\n{}\n\n",
            analysis.subject_type,
            normalize_text(&analysis.analysis)
        ));

        out.push_str("## Opinions & Philosophy\n\n");
        out.push_str(&bullet_list("Key opinions", opinions));
        out.push_str(&format!("{}\n", normalize_text(insights)));

        out
    }

    // =========================================================================
    // PERSISTENCE
    // =========================================================================

    /// Write a report and return where it went.
    ///
    /// With no explicit path the file lands in the configured output directory
    /// as `<subject>_<timestamp>.md`. Parent directories are created.
    pub fn save_report(
        &self,
        report: &str,
        subject: &str,
        output: Option<&Path>,
    ) -> Result<PathBuf, ReportError> {
        let path = match output {
            Some(path) => path.to_path_buf(),
            None => self.output_dir.join(default_file_name(subject, Utc::now())),
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ReportError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        fs::write(&path, report).map_err(|source| ReportError::Io {
            path: path.clone(),
            source,
        })?;

        info!(path = %path.display(), bytes = report.len(), "Report saved");
        Ok(path)
    }
}

fn header(title: &str, at: DateTime<Utc>) -> String {
    format!(
        "# {}\n\n_Generated {}_\n\n",
        title,
        at.format("%Y-%m-%d %H:%M:%S UTC")
    )
}

fn entity_section(entity: &ProcessedEntity) -> String {
    let mut out = format!("**Name:** {}\n", entity.name);
    if let Some(company) = &entity.company {
        out.push_str(&format!("**Company:** {}\n", company));
    }
    out.push_str(&format!(
        "**Type:** {}\n**Sources:** {}\n\n",
        entity.subject_type, entity.sources_count
    ));
    out.push_str(&bullet_list("Key points", &entity.key_points));
    out.push_str(&format!("{}\n\n", entity.analysis));
    out
}

fn bullet_list(heading: &str, items: &[String]) -> String {
    if items.is_empty() {
        return String::new();
    }
    let mut out = format!("### {}\n\n", heading);
    for item in items {
        out.push_str(&format!("- {}\n", item));
    }
    out.push('\n');
    out
}

fn contact_section(info: &ContactInfo) -> String {
    if info.is_empty() {
        return "No contact details found.\n\n".to_string();
    }

    let twitter: Vec<String> = info.twitter.iter().map(|h| format!("@{}", h)).collect();
    let linkedin: Vec<String> = info
        .linkedin
        .iter()
        .map(|s| format!("linkedin.com/in/{}", s))
        .collect();

    let mut out = String::new();
    for (label, values) in [
        ("Twitter", &twitter),
        ("LinkedIn", &linkedin),
        ("Email", &info.email),
        ("Website", &info.website),
    ] {
        if !values.is_empty() {
            out.push_str(&format!("- **{}:** {}\n", label, values.join(", ")));
        }
    }
    out.push('\n');
    out
}

/// `Jane Doe` at 2024-03-01 09:30:00 becomes `jane_doe_20240301_093000.md`.
fn default_file_name(subject: &str, at: DateTime<Utc>) -> String {
    let mut slug = String::new();
    for c in subject.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug = slug.trim_end_matches('_');
    let slug = if slug.is_empty() { "report" } else { slug };

    format!("{}_{}.md", slug, at.format("%Y%m%d_%H%M%S"))
}

// =============================================================================
// UNIT TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::SubjectType;
    use crate::processor::{ProcessedInsights, ResearchMetadata};
    use chrono::TimeZone;

    fn generator(dir: &Path) -> ReportGenerator {
        let config = Config {
            output_dir: dir.to_path_buf(),
            ..Config::default()
        };
        ReportGenerator::new(&config)
    }

    fn processed() -> ProcessedResearch {
        ProcessedResearch {
            person: ProcessedEntity {
                name: "Jane Doe".to_string(),
                company: Some("Acme".to_string()),
                subject_type: SubjectType::Founder,
                analysis: "Jane founded Acme.".to_string(),
                key_points: vec!["Founded Acme in 2015".to_string()],
                sources_count: 4,
            },
            company: ProcessedEntity {
                name: "Acme".to_string(),
                company: None,
                subject_type: SubjectType::Startup,
                analysis: "Acme makes anvils.".to_string(),
                key_points: Vec::new(),
                sources_count: 3,
            },
            insights: ProcessedInsights {
                insights: "Jane writes about tooling.".to_string(),
                key_opinions: vec!["developer tools are underrated".to_string()],
                sources_count: 2,
            },
            contact_info: ContactInfo {
                twitter: vec!["janedoe".to_string()],
                linkedin: vec!["jane-doe".to_string()],
                email: Vec::new(),
                website: Vec::new(),
            },
            metadata: ResearchMetadata {
                processed_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
                total_sources: 9,
            },
        }
    }

    #[test]
    fn test_comprehensive_report_sections() {
        let report = generator(Path::new("reports")).comprehensive(&processed());

        assert!(report.starts_with("# Research Report: Jane Doe (Acme)"));
        assert!(report.contains("_Generated 2024-03-01 09:30:00 UTC_"));
        assert!(report.contains("**Type:** founder"));
        assert!(report.contains("**Type:** startup"));
        assert!(report.contains("- Founded Acme in 2015"));
        assert!(report.contains("- developer tools are underrated"));
        assert!(report.contains("- **Twitter:** @janedoe"));
        assert!(report.contains("- **LinkedIn:** linkedin.com/in/jane-doe"));
        assert!(!report.contains("**Email:**"));
        assert!(report.contains("- **Total: 9**"));
    }

    #[test]
    fn test_quick_report_normalizes_analysis() {
        let person = AnalysisResult {
            analysis: "## Role\n\n**CEO** of Acme".to_string(),
            subject_type: SubjectType::Founder,
        };
        let company = AnalysisResult {
            analysis: "Error analyzing company data: timeout".to_string(),
            subject_type: SubjectType::Unknown,
        };
        let report = generator(Path::new("reports")).quick("Jane", "Acme", &person, &company);

        assert!(report.contains("Role CEO of Acme"));
        assert!(report.contains("**Type:** unknown"));
        assert!(report.contains("Error analyzing company data: timeout"));
    }

    #[test]
    fn test_investor_report_lists_opinions() {
        let analysis = AnalysisResult {
            analysis: "Invests in seed-stage infra.".to_string(),
            subject_type: SubjectType::Investor,
        };
        let report = generator(Path::new("reports")).investor(
            "Jane",
            "Fund",
            &analysis,
            "She believes that infra is undervalued.",
            &["infra is undervalued today".to_string()],
        );

        assert!(report.starts_with("# Investor Profile: Jane (Fund)"));
        assert!(report.contains("**Type:** investor"));
        assert!(report.contains("- infra is undervalued today"));
    }

    #[test]
    fn test_default_file_name() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();

        assert_eq!(default_file_name("Jane Doe", at), "jane_doe_20240301_093000.md");
        assert_eq!(default_file_name("  O'Brien & Co. ", at), "o_brien_co_20240301_093000.md");
        assert_eq!(default_file_name("!!!", at), "report_20240301_093000.md");
    }

    #[test]
    fn test_save_report_default_location() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("nested").join("reports");

        let path = generator(&out_dir)
            .save_report("# Report", "Jane Doe", None)
            .unwrap();

        assert!(path.starts_with(&out_dir));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("jane_doe_"));
        assert!(name.ends_with(".md"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "# Report");
    }

    #[test]
    fn test_save_report_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("custom").join("brief.md");

        let path = generator(Path::new("unused"))
            .save_report("body", "Jane", Some(&target))
            .unwrap();

        assert_eq!(path, target);
        assert_eq!(fs::read_to_string(&target).unwrap(), "body");
    }

    #[test]
    fn test_save_report_failure() {
        let dir = tempfile::tempdir().unwrap();
        // A file where a directory is expected.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();

        let err = generator(&blocker)
            .save_report("body", "Jane", None)
            .unwrap_err();

        assert!(matches!(err, ReportError::Io { .. }));
    }
}
