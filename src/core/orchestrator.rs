use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::analyzers::error::AnalyzerFailure;
use crate::analyzers::traits::{duration_ms, AnalysisResult, Analyzer, AnalyzerOptions};
use crate::core::cache::{fingerprint, ValidationCache};
use crate::core::config::Config;
use crate::core::report::AggregatedReport;

const ORCHESTRATOR_TARGET: &str = "editguard::orchestrator";

/// Runs every enabled analyzer against one file concurrently and merges the
/// results.
///
/// Individual analyzer failures, timeouts and panics become failed
/// [`AnalysisResult`]s; `validate` itself never fails. Identical requests
/// are answered from the shared [`ValidationCache`]. Two concurrent calls
/// for the same fingerprint both compute; the later insert wins.
pub struct ValidationOrchestrator {
    analyzers: Vec<Arc<dyn Analyzer>>,
    options: AnalyzerOptions,
    cache: Arc<ValidationCache>,
    timeout: Duration,
    settings: serde_json::Value,
}

impl ValidationOrchestrator {
    pub fn new(
        analyzers: Vec<Arc<dyn Analyzer>>,
        options: AnalyzerOptions,
        cache: Arc<ValidationCache>,
        timeout: Duration,
    ) -> Self {
        let names: Vec<String> = analyzers.iter().map(|a| a.name().to_string()).collect();
        let settings = json!({
            "analyzers": names,
            "options": options,
            "timeout_ms": duration_ms(timeout),
        });
        Self {
            analyzers,
            options,
            cache,
            timeout,
            settings,
        }
    }

    /// Folds the whole configuration into the cache fingerprint.
    pub fn with_config(mut self, config: &Config) -> Self {
        self.settings["config"] = json!(config);
        self
    }

    pub fn analyzers(&self) -> &[Arc<dyn Analyzer>] {
        &self.analyzers
    }

    pub fn options(&self) -> &AnalyzerOptions {
        &self.options
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[allow(dead_code)]
    pub fn cache(&self) -> &Arc<ValidationCache> {
        &self.cache
    }

    pub async fn validate(&self, file: &Path) -> AggregatedReport {
        let started = Instant::now();

        let content = match tokio::fs::read(file).await {
            Ok(content) => content,
            Err(err) => {
                warn!(
                    target: ORCHESTRATOR_TARGET,
                    file = %file.display(),
                    error = %err,
                    "cannot read file for validation"
                );
                let failure = AnalyzerFailure::io(file, err);
                let results = self
                    .analyzers
                    .iter()
                    .map(|a| AnalysisResult::failed(a.name(), &failure, Duration::ZERO))
                    .collect();
                return AggregatedReport::aggregate(file, results, started.elapsed());
            }
        };

        let key = fingerprint(file, &content, &self.settings);
        if let Some(hit) = self.cache.get(&key) {
            debug!(target: ORCHESTRATOR_TARGET, file = %file.display(), "cache hit");
            return hit;
        }

        if self.analyzers.is_empty() {
            return AggregatedReport::empty(file);
        }

        let handles: Vec<_> = self
            .analyzers
            .iter()
            .map(|analyzer| {
                let name = analyzer.name().to_string();
                let analyzer = Arc::clone(analyzer);
                let file = file.to_path_buf();
                let options = self.options.for_check();
                let timeout = self.timeout;
                let handle = tokio::spawn(async move {
                    let began = Instant::now();
                    let outcome =
                        match tokio::time::timeout(timeout, analyzer.analyze(&file, &options)).await {
                            Ok(outcome) => outcome,
                            Err(_) => Err(AnalyzerFailure::Timeout {
                                analyzer: analyzer.name().to_string(),
                                timeout_ms: duration_ms(timeout),
                            }),
                        };
                    (outcome, began.elapsed())
                });
                (name, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            let result = match handle.await {
                Ok((Ok(issues), elapsed)) => AnalysisResult::from_issues(&name, issues, elapsed),
                Ok((Err(failure), elapsed)) => {
                    warn!(
                        target: ORCHESTRATOR_TARGET,
                        analyzer = %name,
                        error = %failure,
                        "analyzer failed"
                    );
                    AnalysisResult::failed(&name, &failure, elapsed)
                }
                Err(join_error) => {
                    let failure = AnalyzerFailure::Panicked {
                        analyzer: name.clone(),
                        message: join_error.to_string(),
                    };
                    warn!(target: ORCHESTRATOR_TARGET, analyzer = %name, "analyzer panicked");
                    AnalysisResult::failed(&name, &failure, started.elapsed())
                }
            };
            results.push(result);
        }

        let report = AggregatedReport::aggregate(file, results, started.elapsed());
        debug!(
            target: ORCHESTRATOR_TARGET,
            file = %file.display(),
            success = report.success,
            issues = report.summary.total,
            elapsed_ms = report.timing.total_ms,
            "validation complete"
        );
        self.cache.insert(key, &report);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::mock::MockAnalyzer;
    use crate::analyzers::traits::{Issue, Severity};
    use std::fs;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    fn cache() -> Arc<ValidationCache> {
        Arc::new(ValidationCache::new(Duration::from_secs(60), 16))
    }

    fn orchestrator(analyzers: Vec<Arc<dyn Analyzer>>) -> ValidationOrchestrator {
        ValidationOrchestrator::new(
            analyzers,
            AnalyzerOptions::default(),
            cache(),
            Duration::from_millis(500),
        )
    }

    fn fixture(content: &str) -> (TempDir, std::path::PathBuf) {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.ts");
        fs::write(&file, content).unwrap();
        (tmp, file)
    }

    fn warning(analyzer: &str, message: &str) -> Issue {
        Issue::new(analyzer, "a.ts", Severity::Warning, message)
    }

    #[tokio::test]
    async fn test_no_analyzers_is_empty_success() {
        let (_tmp, file) = fixture("let a = 1;\n");
        let report = orchestrator(vec![]).validate(&file).await;
        assert!(report.success);
        assert!(report.results.is_empty());
    }

    #[tokio::test]
    async fn test_result_per_enabled_analyzer_despite_failures() {
        let (_tmp, file) = fixture("let a = 1;\n");
        let analyzers: Vec<Arc<dyn Analyzer>> = vec![
            Arc::new(MockAnalyzer::new("typescript").with_issues(vec![warning("typescript", "w")])),
            Arc::new(MockAnalyzer::new("biome").failing(AnalyzerFailure::NonZeroExit {
                program: "biome".to_string(),
                status: Some(2),
                stderr: "bad config".to_string(),
            })),
            Arc::new(MockAnalyzer::new("crashy").panicking()),
        ];
        let report = orchestrator(analyzers).validate(&file).await;

        assert_eq!(report.results.len(), 3);
        assert!(!report.success);
        let names: Vec<_> = report.results.iter().map(|r| r.analyzer.as_str()).collect();
        assert_eq!(names, vec!["biome", "crashy", "typescript"]);

        assert!(report.results[0].failure.as_deref().unwrap().contains("bad config"));
        assert!(report.results[1].failure.as_deref().unwrap().contains("panicked"));
        let ts = &report.results[2];
        assert!(!ts.is_failure());
        assert_eq!(ts.issues.len(), 1);
        assert_eq!(ts.issues[0].message, "w");
    }

    #[tokio::test]
    async fn test_timeout_becomes_failure_result() {
        let (_tmp, file) = fixture("let a = 1;\n");
        let analyzers: Vec<Arc<dyn Analyzer>> = vec![
            Arc::new(MockAnalyzer::new("slow").slow(Duration::from_secs(30))),
            Arc::new(MockAnalyzer::new("quick")),
        ];
        let orchestrator = ValidationOrchestrator::new(
            analyzers,
            AnalyzerOptions::default(),
            cache(),
            Duration::from_millis(50),
        );
        let started = Instant::now();
        let report = orchestrator.validate(&file).await;
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(report.results.len(), 2);
        let result = |name: &str| report.results.iter().find(|r| r.analyzer == name).unwrap();
        assert!(result("slow").is_failure());
        assert!(result("slow").failure.as_deref().unwrap().contains("timed out"));
        assert!(!result("quick").is_failure());
        assert!(!report.success);
    }

    #[tokio::test]
    async fn test_analyzers_run_concurrently() {
        let (_tmp, file) = fixture("let a = 1;\n");
        let analyzers: Vec<Arc<dyn Analyzer>> = (0..4)
            .map(|i| {
                Arc::new(MockAnalyzer::new(&format!("a{i}")).slow(Duration::from_millis(200)))
                    as Arc<dyn Analyzer>
            })
            .collect();
        let orchestrator = ValidationOrchestrator::new(
            analyzers,
            AnalyzerOptions::default(),
            cache(),
            Duration::from_secs(5),
        );
        let started = Instant::now();
        let report = orchestrator.validate(&file).await;
        assert!(started.elapsed() < Duration::from_millis(700));
        assert!(report.success);
        assert!(report.timing.parallel_efficiency > 1.0);
    }

    #[tokio::test]
    async fn test_second_call_is_served_from_cache() {
        let (_tmp, file) = fixture("let a = 1;\n");
        let mock = MockAnalyzer::new("biome").with_issues(vec![warning("biome", "w")]);
        let calls = mock.analyze_counter();
        let orchestrator = orchestrator(vec![Arc::new(mock)]);

        let first = orchestrator.validate(&file).await;
        let second = orchestrator.validate(&file).await;
        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(
            first.issues().collect::<Vec<_>>(),
            second.issues().collect::<Vec<_>>()
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_changed_content_misses_cache() {
        let (_tmp, file) = fixture("let a = 1;\n");
        let mock = MockAnalyzer::new("biome");
        let calls = mock.analyze_counter();
        let orchestrator = orchestrator(vec![Arc::new(mock)]);

        orchestrator.validate(&file).await;
        fs::write(&file, "let a = 2;\n").unwrap();
        let report = orchestrator.validate(&file).await;
        assert!(!report.cached);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_config_change_misses_cache() {
        let (_tmp, file) = fixture("let a = 1;\n");
        let shared = cache();
        let mock = Arc::new(MockAnalyzer::new("biome"));
        let calls = mock.analyze_counter();

        let mut config = Config::default();
        let first = ValidationOrchestrator::new(
            vec![mock.clone() as Arc<dyn Analyzer>],
            AnalyzerOptions::default(),
            Arc::clone(&shared),
            Duration::from_secs(1),
        )
        .with_config(&config);
        first.validate(&file).await;

        config.rollback_on_regression = true;
        let second = ValidationOrchestrator::new(
            vec![mock as Arc<dyn Analyzer>],
            AnalyzerOptions::default(),
            Arc::clone(&shared),
            Duration::from_secs(1),
        )
        .with_config(&config);
        assert!(!second.validate(&file).await.cached);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(shared.len(), 2);
    }

    #[tokio::test]
    async fn test_unreadable_file_fails_every_analyzer() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("missing.ts");
        let analyzers: Vec<Arc<dyn Analyzer>> = vec![
            Arc::new(MockAnalyzer::new("biome")),
            Arc::new(MockAnalyzer::new("typescript")),
        ];
        let orchestrator = orchestrator(analyzers);
        let report = orchestrator.validate(&missing).await;
        assert_eq!(report.results.len(), 2);
        assert!(report.results.iter().all(|r| r.is_failure()));
        assert!(!report.success);
        assert!(orchestrator.cache().is_empty());
    }
}
