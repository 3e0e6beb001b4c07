//! The safe workflow: plan, back up, apply, build, test, and roll back
//! on any failure after the first write.
//!
//! Progress is encoded in the type of [`Workflow`]; each transition
//! consumes the previous state. A failed transition hands back a
//! [`Halted`] carrying everything gathered so far, and [`SafeWorkflow`]
//! turns it into a rolled-back or failed [`WorkflowOutcome`].

use crate::applicator::{CodeApplicator, Overlay};
use crate::error::PipelineError;
use crate::line_map::LineMap;
use crate::plan::build_plan;
use crate::types::{
    ActionOutcome, ActionReport, ApplyStatus, Plan, TerminalState, WorkflowOutcome, WorkflowPhase,
};
use refit_common::config::{RefitConfig, WorkflowSettings};
use refit_common::fs_utils::file_key;
use refit_snapshot::{
    DirSnapshotStore, RestoreReport, RollbackError, RollbackManager, Snapshot, SnapshotSet,
    SnapshotStore,
};
use refit_surgeon::{DefectRecord, StrategyOptions, StrategyRegistry};
use refit_verify::{BuildVerifier, CompilationValidator, StepOutcome};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ── Typestate markers ──────────────────────────────────────────────

/// Plan built; nothing touched yet.
pub struct Planned;

/// Snapshot set taken for every file the plan may write.
pub struct BackedUp;

/// Actions applied to the working tree.
pub struct Applied;

/// Project build verified (or skipped).
pub struct Built;

/// Tests verified (or skipped).
pub struct Verified;

// ── Shared run state ───────────────────────────────────────────────

#[derive(Default)]
struct Run {
    plan: Plan,
    snapshot_set: Option<SnapshotSet>,
    members: Vec<Snapshot>,
    actions: Vec<ActionReport>,
    build: Option<StepOutcome>,
    tests: Option<StepOutcome>,
    errors: Vec<String>,
}

impl Run {
    fn member_for(&self, file: &Path) -> Option<&Snapshot> {
        let key = file_key(file);
        self.members.iter().find(|s| s.original == key)
    }

    fn applied_count(&self) -> usize {
        self.actions.iter().filter(|a| a.outcome.is_applied()).count()
    }
}

/// A stage that did not succeed.
pub struct Halted {
    run: Run,
    phase: WorkflowPhase,
    /// Files may have been written; a rollback is required.
    dirty: bool,
}

pub struct Workflow<'a, State = Planned> {
    env: &'a SafeWorkflow,
    run: Run,
    _state: PhantomData<State>,
}

impl<'a, S> Workflow<'a, S> {
    fn into_state<T>(self) -> Workflow<'a, T> {
        Workflow {
            env: self.env,
            run: self.run,
            _state: PhantomData,
        }
    }

    fn halt(mut self, phase: WorkflowPhase, dirty: bool, error: impl ToString) -> Halted {
        let message = error.to_string();
        tracing::error!("Workflow halted in {:?}: {}", phase, message);
        self.run.errors.push(message);
        Halted {
            run: self.run,
            phase,
            dirty,
        }
    }

    pub fn plan(&self) -> &Plan {
        &self.run.plan
    }
}

// ── Planned → BackedUp ─────────────────────────────────────────────

impl<'a> Workflow<'a, Planned> {
    pub fn new(env: &'a SafeWorkflow, records: &[DefectRecord]) -> Self {
        let plan = build_plan(&env.project_root, records, &env.registry);
        Workflow {
            env,
            run: Run {
                plan,
                ..Run::default()
            },
            _state: PhantomData,
        }
    }

    /// Snapshot every file a non-advisory action may write, as one set.
    pub fn backup(mut self) -> Result<Workflow<'a, BackedUp>, Halted> {
        let files = self.run.plan.mutating_files();
        if files.is_empty() {
            tracing::info!("No action writes; skipping backup");
            return Ok(self.into_state());
        }

        let env = self.env;
        let store = &env.store;
        let set = match store.create_set(&files) {
            Ok(set) => set,
            Err(e) => return Err(self.halt(WorkflowPhase::Backup, false, e)),
        };
        let mut members = Vec::with_capacity(set.members.len());
        for id in &set.members {
            match store.get(*id) {
                Ok(snapshot) => members.push(snapshot),
                Err(e) => return Err(self.halt(WorkflowPhase::Backup, false, e)),
            }
        }
        tracing::info!("Backed up {} file(s) as set {}", members.len(), set.id);
        self.run.snapshot_set = Some(set);
        self.run.members = members;
        Ok(self.into_state())
    }
}

// ── BackedUp → Applied ─────────────────────────────────────────────

impl<'a> Workflow<'a, BackedUp> {
    /// Apply every action in order, remapping lines through earlier edits.
    pub async fn apply(mut self) -> Result<Workflow<'a, Applied>, Halted> {
        let env = self.env;
        let mut lines = LineMap::new();
        let actions = self.run.plan.actions.clone();

        for (index, action) in actions.into_iter().enumerate() {
            let record = lines.remap_record(&action.record);
            let dirty = self.run.applied_count() > 0;
            let Some(strategy) = env.registry.get(action.strategy) else {
                let error = PipelineError::UnknownStrategy(action.strategy.to_string());
                return Err(self.halt(WorkflowPhase::Apply, dirty, error));
            };
            let member = self.run.member_for(&record.file).cloned();
            if !action.advisory && member.is_none() {
                let error = RollbackError::NoSnapshot(format!(
                    "{} has no snapshot in this run",
                    record.file.display()
                ));
                return Err(self.halt(WorkflowPhase::Apply, dirty, error));
            }

            let applied = env.applicator.apply(strategy, &record, member.as_ref()).await;
            let outcome = match applied {
                Ok(detail) => match detail.status {
                    ApplyStatus::Success | ApplyStatus::SuccessWithWarnings => {
                        ActionOutcome::Applied { detail }
                    }
                    ApplyStatus::Advisory => ActionOutcome::Skipped {
                        reason: format!("advisory: {}", detail.description),
                        detail: Some(detail),
                    },
                    ApplyStatus::CompilationFailed => ActionOutcome::Failed {
                        reason: format!(
                            "validation failed: {}",
                            detail
                                .validation
                                .as_ref()
                                .map(|v| v.error_summary())
                                .unwrap_or_default()
                        ),
                        detail: Some(detail),
                    },
                },
                Err(e) if e.is_unrecoverable() => {
                    return Err(self.halt(WorkflowPhase::Apply, true, e));
                }
                Err(e) => ActionOutcome::Failed {
                    reason: e.to_string(),
                    detail: None,
                },
            };

            lines.record(&record.file, outcome.shifts());
            let failed = outcome.is_failed();
            if let ActionOutcome::Failed { reason, .. } = &outcome {
                tracing::warn!("Action {} ({}) failed: {}", index, action.strategy, reason);
            }
            self.run.actions.push(ActionReport {
                index,
                strategy: action.strategy,
                record,
                outcome,
            });

            if failed && env.settings.stop_on_first_failure() {
                let message = format!("action {index} ({}) failed; stopping", action.strategy);
                return Err(self.halt(WorkflowPhase::Apply, true, message));
            }
        }
        Ok(self.into_state())
    }
}

// ── Applied → Built → Verified ─────────────────────────────────────

impl<'a> Workflow<'a, Applied> {
    pub fn applied_count(&self) -> usize {
        self.run.applied_count()
    }

    pub async fn verify_build(mut self) -> Result<Workflow<'a, Built>, Halted> {
        let env = self.env;
        if !env.settings.run_build() {
            self.run.build = Some(StepOutcome::skipped("disabled by workflow.run_build"));
            return Ok(self.into_state());
        }
        let result = env.verifier.verify_build(&env.project_root).await;
        match result {
            Ok(step) if step.failed() => {
                let reason = step.reason.clone().unwrap_or_else(|| "build failed".into());
                self.run.build = Some(step);
                Err(self.halt(WorkflowPhase::BuildVerify, true, reason))
            }
            Ok(step) => {
                self.run.build = Some(step);
                Ok(self.into_state())
            }
            Err(e) => Err(self.halt(WorkflowPhase::BuildVerify, true, e)),
        }
    }
}

impl<'a> Workflow<'a, Built> {
    pub async fn verify_tests(mut self) -> Result<Workflow<'a, Verified>, Halted> {
        let env = self.env;
        if !env.settings.run_tests() {
            self.run.tests = Some(StepOutcome::skipped("disabled by workflow.run_tests"));
            return Ok(self.into_state());
        }
        let result = env.verifier.verify_tests(&env.project_root).await;
        match result {
            Ok(step) if step.failed() => {
                let reason = step.reason.clone().unwrap_or_else(|| "tests failed".into());
                self.run.tests = Some(step);
                Err(self.halt(WorkflowPhase::TestVerify, true, reason))
            }
            Ok(step) => {
                self.run.tests = Some(step);
                Ok(self.into_state())
            }
            Err(e) => Err(self.halt(WorkflowPhase::TestVerify, true, e)),
        }
    }
}

// ── Orchestrator ───────────────────────────────────────────────────

/// Owns the collaborators of one run. Nothing here is global.
pub struct SafeWorkflow {
    project_root: PathBuf,
    registry: StrategyRegistry,
    store: Arc<dyn SnapshotStore>,
    applicator: CodeApplicator,
    verifier: BuildVerifier,
    settings: WorkflowSettings,
}

impl SafeWorkflow {
    pub fn new(
        project_root: impl Into<PathBuf>,
        registry: StrategyRegistry,
        store: Arc<dyn SnapshotStore>,
        validator: CompilationValidator,
        verifier: BuildVerifier,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            project_root: project_root.into(),
            registry,
            applicator: CodeApplicator::new(Arc::clone(&store), validator),
            store,
            verifier,
            settings,
        }
    }

    pub fn from_config(project_root: &Path, config: &RefitConfig) -> Result<Self, PipelineError> {
        let store: Arc<dyn SnapshotStore> =
            Arc::new(DirSnapshotStore::from_config(project_root, config)?);
        Ok(Self::new(
            project_root,
            StrategyRegistry::with_defaults(&StrategyOptions::from_config(config)),
            store,
            CompilationValidator::from_config(project_root, &config.validator, &config.build),
            BuildVerifier::from_config(project_root, &config.build),
            config.workflow.clone(),
        ))
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn store(&self) -> Arc<dyn SnapshotStore> {
        Arc::clone(&self.store)
    }

    pub async fn run(&self, records: &[DefectRecord]) -> WorkflowOutcome {
        let workflow = Workflow::new(self, records);
        if workflow.run.plan.is_empty() {
            tracing::info!("Empty plan; nothing to do");
            return self.finish(workflow.run, WorkflowPhase::Planning, TerminalState::Complete);
        }
        if self.settings.dry_run() {
            return self.dry_run(workflow.run);
        }

        tracing::info!("Phase: backup");
        let backed_up = match workflow.backup() {
            Ok(w) => w,
            Err(halted) => return self.recover(halted),
        };
        tracing::info!("Phase: apply");
        let applied = match backed_up.apply().await {
            Ok(w) => w,
            Err(halted) => return self.recover(halted),
        };
        if applied.applied_count() == 0 {
            tracing::info!("No action changed code; skipping build and tests");
            let run = applied.run;
            return self.finish(run, WorkflowPhase::Apply, TerminalState::Complete);
        }
        tracing::info!("Phase: build verification");
        let built = match applied.verify_build().await {
            Ok(w) => w,
            Err(halted) => return self.recover(halted),
        };
        tracing::info!("Phase: test verification");
        let verified = match built.verify_tests().await {
            Ok(w) => w,
            Err(halted) => return self.recover(halted),
        };
        tracing::info!("Workflow complete");
        self.finish(verified.run, WorkflowPhase::Complete, TerminalState::Complete)
    }

    /// Plan and rewrite against an overlay; never snapshot, write or verify.
    fn dry_run(&self, mut run: Run) -> WorkflowOutcome {
        tracing::info!("Dry run over {} action(s)", run.plan.len());
        let mut overlay = Overlay::new();
        let mut lines = LineMap::new();

        for (index, action) in run.plan.actions.iter().enumerate() {
            let record = lines.remap_record(&action.record);
            let result = match self.registry.get(action.strategy) {
                Some(strategy) => self.applicator.preview(strategy, &record, &mut overlay),
                None => Err(PipelineError::UnknownStrategy(action.strategy.to_string())),
            };
            let outcome = match result {
                Ok(detail) if detail.status == ApplyStatus::Advisory => ActionOutcome::Skipped {
                    reason: format!("advisory: {}", detail.description),
                    detail: Some(detail),
                },
                Ok(detail) => ActionOutcome::Applied { detail },
                Err(e) => {
                    tracing::warn!("Dry run of action {} failed: {}", index, e);
                    ActionOutcome::Failed {
                        reason: e.to_string(),
                        detail: None,
                    }
                }
            };
            lines.record(&record.file, outcome.shifts());
            run.actions.push(ActionReport {
                index,
                strategy: action.strategy,
                record,
                outcome,
            });
        }

        let mut outcome = self.finish(run, WorkflowPhase::Apply, TerminalState::Complete);
        outcome.dry_run = true;
        outcome.success = outcome.failed_count() == 0;
        outcome
    }

    /// Roll back a halted run when it may have written anything.
    fn recover(&self, halted: Halted) -> WorkflowOutcome {
        let Halted { mut run, phase, dirty } = halted;
        if !dirty {
            return self.finish(run, phase, TerminalState::Failed);
        }

        let Some(set) = run.snapshot_set.clone() else {
            run.errors.push(
                RollbackError::NoSnapshot("no snapshot set exists for this run".into()).to_string(),
            );
            let mut outcome = self.finish(run, phase, TerminalState::Failed);
            outcome.unrecoverable = true;
            return outcome;
        };

        tracing::warn!("Rolling back set {} after failure in {:?}", set.id, phase);
        let manager = RollbackManager::new(Arc::clone(&self.store));
        match manager.restore_set(set.id, true) {
            Ok(reports) => {
                let mut outcome = self.finish(run, phase, TerminalState::RolledBack);
                outcome.rolled_back = true;
                outcome.restored = reports;
                outcome
            }
            Err(e) => {
                tracing::error!("{}", e);
                run.errors.push(e.to_string());
                let mut outcome = self.finish(run, phase, TerminalState::Failed);
                outcome.unrecoverable = true;
                outcome
            }
        }
    }

    fn finish(&self, run: Run, phase: WorkflowPhase, state: TerminalState) -> WorkflowOutcome {
        if let Some(set) = &run.snapshot_set {
            self.store.release_set(set.id);
        }
        WorkflowOutcome {
            phase,
            state,
            success: state == TerminalState::Complete,
            rolled_back: false,
            unrecoverable: false,
            dry_run: false,
            snapshot_set: run.snapshot_set.as_ref().map(|s| s.id),
            plan: run.plan,
            actions: run.actions,
            build: run.build,
            tests: run.tests,
            restored: Vec::<RestoreReport>::new(),
            errors: run.errors,
        }
    }
}
