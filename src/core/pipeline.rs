use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::analyzers::traits::Analyzer;
use crate::analyzers::version::ResolvedVersion;
use crate::analyzers::{BiomeAnalyzer, TypeScriptAnalyzer, VersionResolver};
use crate::core::cache::ValidationCache;
use crate::core::config::Config;
use crate::core::orchestrator::ValidationOrchestrator;
use crate::core::report::AggregatedReport;
use crate::fixers::{FixApplicationResult, FixSequencer, FixVerifier, VerificationResult, VerificationStatus};
use crate::utils::fs::write_atomic;

const PIPELINE_TARGET: &str = "editguard::pipeline";

/// Everything a caller learns about one `validate_and_fix` run.
#[derive(Debug, Clone, Serialize)]
pub struct FinalResult {
    pub report: AggregatedReport,
    pub fix: Option<FixApplicationResult>,
    pub verification: Option<VerificationResult>,
    /// Set when a regression made us put the pre-fix content back.
    pub rolled_back: bool,
}

impl FinalResult {
    fn report_only(report: AggregatedReport) -> Self {
        Self {
            report,
            fix: None,
            verification: None,
            rolled_back: false,
        }
    }
}

/// Validate, then optionally fix, verify and roll back. Never fails: every
/// problem ends up in a field of the returned [`FinalResult`].
pub async fn run(orchestrator: &ValidationOrchestrator, file: &Path, config: &Config) -> FinalResult {
    let report = orchestrator.validate(file).await;

    if !config.autofix || report.pending_fixes().next().is_none() {
        return FinalResult::report_only(report);
    }

    let original = match tokio::fs::read_to_string(file).await {
        Ok(content) => content,
        Err(err) => {
            warn!(target: PIPELINE_TARGET, file = %file.display(), error = %err, "cannot read file for fixing");
            let mut result = FinalResult::report_only(report);
            result.fix = Some(FixApplicationResult::aborted(format!("cannot read file: {err}")));
            return result;
        }
    };

    let sequencer = FixSequencer::new(
        file,
        orchestrator.analyzers(),
        orchestrator.options(),
        orchestrator.timeout(),
    );
    let fix = sequencer.apply(&report, &original).await;

    let fixed_content = match &fix.content {
        Some(content) if config.verify && *content != original => content.clone(),
        _ => {
            return FinalResult {
                report,
                fix: Some(fix),
                verification: None,
                rolled_back: false,
            }
        }
    };

    let verification = FixVerifier::new(orchestrator)
        .verify(file, &report, &fixed_content)
        .await;

    let mut rolled_back = false;
    if verification.status == VerificationStatus::Regressed && config.rollback_on_regression {
        match write_atomic(file, &original) {
            Ok(()) => {
                info!(
                    target: PIPELINE_TARGET,
                    file = %file.display(),
                    regressed = verification.regressed,
                    "restored pre-fix content after regression"
                );
                rolled_back = true;
            }
            Err(err) => {
                warn!(target: PIPELINE_TARGET, file = %file.display(), error = %err, "rollback failed");
            }
        }
    }

    FinalResult {
        report,
        fix: Some(fix),
        verification: Some(verification),
        rolled_back,
    }
}

/// Long-lived state shared across validations: the version probe result and
/// the report cache.
pub struct Engine {
    resolver: VersionResolver,
    cache: Arc<ValidationCache>,
}

impl Engine {
    pub fn new(config: &Config) -> Self {
        Self {
            resolver: VersionResolver::new(config.biome.binary.clone(), config.timeout()),
            cache: Arc::new(ValidationCache::new(
                Duration::from_secs(config.cache.ttl_secs),
                config.cache.max_entries,
            )),
        }
    }

    #[allow(dead_code)]
    pub fn cache(&self) -> &Arc<ValidationCache> {
        &self.cache
    }

    /// `path` may be the file being checked or a project directory.
    pub async fn biome_version(&self, path: &Path, config: &Config) -> ResolvedVersion {
        self.resolver.resolve(path, config.biome.version.as_deref()).await
    }

    /// Builds an orchestrator over the analyzers `config` enables.
    pub async fn orchestrator_for(&self, file: &Path, config: &Config) -> ValidationOrchestrator {
        let mut analyzers: Vec<Arc<dyn Analyzer>> = Vec::new();
        if config.analyzers.biome {
            let resolved = self.biome_version(file, config).await;
            debug!(
                target: PIPELINE_TARGET,
                variant = %resolved.variant,
                source = %resolved.source,
                "using biome"
            );
            analyzers.push(Arc::new(BiomeAnalyzer::new(resolved.variant, config.biome.binary.clone())));
        }
        if config.analyzers.typescript {
            analyzers.push(Arc::new(TypeScriptAnalyzer::with_tsc(config.typescript.binary.clone())));
        }

        ValidationOrchestrator::new(
            analyzers,
            config.analyzer_options(),
            Arc::clone(&self.cache),
            config.timeout(),
        )
        .with_config(config)
    }

    pub async fn validate_and_fix(&self, file: &Path, config: &Config) -> FinalResult {
        let orchestrator = self.orchestrator_for(file, config).await;
        run(&orchestrator, file, config).await
    }
}
