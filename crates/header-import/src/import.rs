//! Header import sequence
//!
//! Runs the steps strictly in order:
//! 1. clone the upstream repository without a working tree
//! 2. create the temporary branch at the requested tag
//! 3. drop the include tree from the local index
//! 4. copy and rewrite each header
//! 5. switch back to the primary branch and delete the temporary one
//! 6. stage the include tree
//!
//! There is no rollback. In strict mode the first git step that exits
//! non-zero aborts the run; in lenient mode statuses are only recorded.

use crate::config::{HeaderSpec, ImportConfig};
use crate::error::ImportError;
use crate::git::{CommandRunner, GitCommand, Step, StepStatus};
use crate::transform;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

/// Everything one import run needs
#[derive(Debug, Clone)]
pub struct ImportPlan {
    pub tag: String,
    pub working_dir: PathBuf,
    pub upstream_url: String,
    pub public_dir: PathBuf,
    pub primary_branch: String,
    pub temp_branch: String,
    pub repo_root: PathBuf,
    pub include_root: PathBuf,
    pub headers: Vec<HeaderSpec>,
    pub strict: bool,
    /// Only copy and rewrite; skip every git step
    pub transform_only: bool,
}

impl ImportPlan {
    pub fn from_config(config: &ImportConfig, tag: String, working_dir: PathBuf) -> Self {
        Self {
            tag,
            working_dir,
            upstream_url: config.upstream.url.clone(),
            public_dir: config.upstream.public_dir.clone(),
            primary_branch: config.upstream.primary_branch.clone(),
            temp_branch: config.upstream.temp_branch.clone(),
            repo_root: config.destination.repo_root.clone(),
            include_root: config.destination.include_root.clone(),
            headers: config.headers.clone(),
            strict: config.general.strict,
            transform_only: false,
        }
    }

    /// Where a header is read from in the upstream checkout
    pub fn source_path(&self, header: &HeaderSpec) -> PathBuf {
        self.working_dir
            .join(&self.public_dir)
            .join(header.relative_path())
    }

    /// Where a header is written in the local include tree
    pub fn destination_path(&self, header: &HeaderSpec) -> PathBuf {
        self.repo_root
            .join(&self.include_root)
            .join(header.relative_path())
    }
}

/// What happened during a run
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Every git step that ran, in order
    pub steps: Vec<(Step, StepStatus)>,
    /// Destination files written, with their line counts
    pub headers: Vec<(PathBuf, usize)>,
}

impl ImportReport {
    /// Status of the last git invocation
    pub fn last_status(&self) -> Option<StepStatus> {
        self.steps.last().map(|(_, status)| *status)
    }

    /// Steps that exited non-zero (only non-empty in lenient mode)
    pub fn failed_steps(&self) -> Vec<Step> {
        self.steps
            .iter()
            .filter(|(_, status)| !status.success())
            .map(|(step, _)| *step)
            .collect()
    }
}

/// Drives one import with a given command runner
pub struct Importer<'a, R: CommandRunner> {
    plan: &'a ImportPlan,
    runner: &'a mut R,
    report: ImportReport,
}

impl<'a, R: CommandRunner> Importer<'a, R> {
    pub fn new(plan: &'a ImportPlan, runner: &'a mut R) -> Self {
        Self {
            plan,
            runner,
            report: ImportReport::default(),
        }
    }

    /// Run the whole sequence
    pub fn run(mut self) -> Result<ImportReport, ImportError> {
        let plan = self.plan;
        info!(
            "Importing {} header(s) from {} at {}",
            plan.headers.len(),
            plan.upstream_url,
            plan.tag
        );

        if !plan.transform_only {
            self.git(GitCommand::clone_no_checkout(
                &plan.upstream_url,
                &plan.working_dir,
            ))?;
            self.git(GitCommand::checkout_new_branch(
                &plan.working_dir,
                &plan.temp_branch,
                &plan.tag,
            ))?;
            self.git(GitCommand::remove_tree(&plan.repo_root, &plan.include_root))?;
        }

        for header in &plan.headers {
            self.copy_header(header)?;
        }

        if !plan.transform_only {
            self.git(GitCommand::checkout(&plan.working_dir, &plan.primary_branch))?;
            self.git(GitCommand::delete_branch(&plan.working_dir, &plan.temp_branch))?;
            self.git(GitCommand::add_tree(&plan.repo_root, &plan.include_root))?;
        }

        let failed = self.report.failed_steps();
        if failed.is_empty() {
            info!("Imported {} header(s)", self.report.headers.len());
        } else {
            warn!(
                "Import finished but {} git step(s) failed: {:?}",
                failed.len(),
                failed
            );
        }

        Ok(self.report)
    }

    fn git(&mut self, command: GitCommand) -> Result<StepStatus, ImportError> {
        let status = self.runner.run(&command)?;
        self.report.steps.push((command.step, status));

        if !status.success() {
            if self.plan.strict {
                return Err(ImportError::StepFailed {
                    step: command.step,
                    status,
                });
            }
            warn!(
                "git step '{}' returned {}, continuing (lenient mode)",
                command.step, status
            );
        }

        Ok(status)
    }

    fn copy_header(&mut self, header: &HeaderSpec) -> Result<(), ImportError> {
        let src = self.plan.source_path(header);
        let dst = self.plan.destination_path(header);

        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).map_err(|e| ImportError::io(parent, e))?;
        }

        println!("{}", src.display());
        println!("{}", dst.display());
        let lines = transform::rewrite_file(&src, &dst)?;
        self.report.headers.push((dst, lines));
        Ok(())
    }
}

/// Convenience wrapper around [`Importer`]
pub fn run_import<R: CommandRunner>(
    plan: &ImportPlan,
    runner: &mut R,
) -> Result<ImportReport, ImportError> {
    Importer::new(plan, runner).run()
}
