//! Pass pipeline runner
//!
//! Orders passes through `PassDAG`, gates them on the opt-level ceiling and
//! the configuration, then threads the module through each in turn.

use super::dag::PassDAG;
use crate::config::error::find_closest_match;
use crate::config::ValidatedConfig;
use crate::features::transform::{Pass, PassResult, UnitSnapshot};
use crate::shared::models::IRModule;
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

/// Why a pass did not run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    OptLevel { level: u8, ceiling: u8 },
    Disabled,
    /// A pass this one requires was skipped
    DependencySkipped { dependency: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OptLevel { level, ceiling } => {
                write!(f, "opt level {} above ceiling {}", level, ceiling)
            }
            Self::Disabled => write!(f, "disabled by configuration"),
            Self::DependencySkipped { dependency } => {
                write!(f, "required pass '{}' was skipped", dependency)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedPass {
    pub name: String,
    pub reason: SkipReason,
}

/// Snapshots recorded by one traced pass
#[derive(Debug, Clone, Serialize)]
pub struct PassTrace {
    pub pass: String,
    pub snapshots: Vec<UnitSnapshot>,
}

#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub module: IRModule,
    /// Executed pass names, in execution order
    pub executed: Vec<String>,
    pub skipped: Vec<SkippedPass>,
    pub traces: Vec<PassTrace>,
    /// Wall time per executed pass
    pub durations: Vec<(String, Duration)>,
}

impl PipelineReport {
    pub fn was_skipped(&self, pass: &str) -> Option<&SkipReason> {
        self.skipped
            .iter()
            .find(|s| s.name == pass)
            .map(|s| &s.reason)
    }

    /// Traced snapshots as pretty JSON
    pub fn traces_to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.traces)
    }
}

/// Stateless between runs; every call is independent
#[derive(Debug, Clone, Default)]
pub struct PassPipelineRunner {
    config: ValidatedConfig,
}

impl PassPipelineRunner {
    pub fn new(config: ValidatedConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatedConfig {
        &self.config
    }

    /// Run every pass with `opt_level <= ceiling` and return the final module
    pub fn run(&self, module: IRModule, passes: &[Pass], ceiling: u8) -> PassResult<IRModule> {
        self.run_with_report(module, passes, ceiling)
            .map(|report| report.module)
    }

    /// Run at the configured opt level
    pub fn run_configured(&self, module: IRModule, passes: &[Pass]) -> PassResult<PipelineReport> {
        self.run_with_report(module, passes, self.config.opt_level)
    }

    pub fn run_with_report(
        &self,
        module: IRModule,
        passes: &[Pass],
        ceiling: u8,
    ) -> PassResult<PipelineReport> {
        let dag = PassDAG::build(passes)?;
        self.warn_unknown_names(passes);
        let forced = self.forced_passes(&dag);
        let ctx = self.config.pass_context(ceiling);

        let mut report = PipelineReport {
            module,
            executed: Vec::new(),
            skipped: Vec::new(),
            traces: Vec::new(),
            durations: Vec::new(),
        };
        let mut skipped: FxHashSet<&str> = FxHashSet::default();

        for &index in dag.execution_order() {
            let pass = &passes[index];
            let name = pass.name();

            if let Some(reason) = self.skip_reason(pass, &dag, &forced, &skipped, ceiling) {
                tracing::warn!(pass = %name, reason = %reason, "skipping pass");
                skipped.insert(name);
                report.skipped.push(SkippedPass {
                    name: name.to_string(),
                    reason,
                });
                continue;
            }

            let start = Instant::now();
            let output = pass.apply(report.module, &ctx)?;
            let elapsed = start.elapsed();
            tracing::info!(
                pass = %name,
                opt_level = pass.opt_level(),
                elapsed_ms = elapsed.as_millis() as u64,
                "pass executed"
            );

            report.module = output.module;
            report.executed.push(name.to_string());
            report.durations.push((name.to_string(), elapsed));
            if !output.snapshots.is_empty() {
                report.traces.push(PassTrace {
                    pass: name.to_string(),
                    snapshots: output.snapshots,
                });
            }
        }

        tracing::info!(
            executed = report.executed.len(),
            skipped = report.skipped.len(),
            ceiling,
            "pipeline finished"
        );
        Ok(report)
    }

    /// Disabled beats everything; a skipped requirement skips the dependent;
    /// forced passes ignore the ceiling
    fn skip_reason(
        &self,
        pass: &Pass,
        dag: &PassDAG,
        forced: &FxHashSet<String>,
        skipped: &FxHashSet<&str>,
        ceiling: u8,
    ) -> Option<SkipReason> {
        if self.config.is_disabled(pass.name()) {
            return Some(SkipReason::Disabled);
        }
        if let Some(dependency) = dag
            .dependencies(pass.name())
            .into_iter()
            .find(|dep| skipped.contains(dep))
        {
            return Some(SkipReason::DependencySkipped {
                dependency: dependency.to_string(),
            });
        }
        if pass.opt_level() > ceiling && !forced.contains(pass.name()) {
            return Some(SkipReason::OptLevel {
                level: pass.opt_level(),
                ceiling,
            });
        }
        None
    }

    /// Required passes plus everything they transitively require
    fn forced_passes(&self, dag: &PassDAG) -> FxHashSet<String> {
        let mut forced: FxHashSet<String> = FxHashSet::default();
        let mut stack: Vec<&str> = self
            .config
            .required_passes
            .iter()
            .map(String::as_str)
            .collect();
        while let Some(name) = stack.pop() {
            if forced.insert(name.to_string()) {
                stack.extend(dag.dependencies(name));
            }
        }
        forced
    }

    fn warn_unknown_names(&self, passes: &[Pass]) {
        let known: Vec<String> = passes.iter().map(|p| p.name().to_string()).collect();
        let configured = self
            .config
            .disabled_passes
            .iter()
            .chain(&self.config.required_passes);
        for name in configured {
            if known.contains(name) {
                continue;
            }
            match find_closest_match(name, &known) {
                Some(suggestion) => tracing::warn!(
                    pass = %name,
                    "configured pass is not in the pass set. Did you mean '{}'?",
                    suggestion
                ),
                None => tracing::warn!(pass = %name, "configured pass is not in the pass set"),
            }
        }
    }
}
