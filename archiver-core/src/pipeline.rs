//! The archive run: clone, enumerate, export, archive
//!
//! Steps run strictly in order on the calling thread. Clone and enumeration
//! failures end the run with an error; failures while exporting or archiving
//! one ref are logged, recorded in that ref's [`RefOutcome`], and the run
//! moves on to the next ref.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::archive::{self, ArchiveFile};
use crate::config::Config;
use crate::export::{self, Snapshot};
use crate::git::{clone_mirror, list_refs, GitRef, GitRepo, RepoLocation};
use crate::manifest::Manifest;
use crate::sanitize::{OutputPlan, PlannedRef};
use crate::workspace::Workspace;
use crate::{Error, Result};

/// Exit code for a run where every ref was archived
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for a run that could not start or could not enumerate refs
pub const EXIT_FATAL: i32 = 1;
/// Exit code for a run where at least one ref failed
pub const EXIT_PARTIAL: i32 = 2;
/// Exit code after Ctrl-C
pub const EXIT_INTERRUPTED: i32 = 130;

/// Everything one run needs to know
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    /// Repository location, path or URL
    pub repo: String,
    /// Output directory root
    pub out_dir: PathBuf,
    /// git executable
    pub git: String,
    /// Parent for the temporary workspace
    pub tmp_dir: Option<PathBuf>,
    pub keep_temp: bool,
    pub include_tags: bool,
    /// Write the manifest after archiving
    pub manifest: bool,
}

impl ArchiveOptions {
    /// Options for `repo` and `out_dir` with the rest taken from `config`
    pub fn from_config(
        repo: impl Into<String>,
        out_dir: impl Into<PathBuf>,
        config: &Config,
    ) -> Self {
        Self {
            repo: repo.into(),
            out_dir: out_dir.into(),
            git: config.git.path.clone(),
            tmp_dir: config.workspace.tmp_dir.clone(),
            keep_temp: config.workspace.keep_temp,
            include_tags: config.output.include_tags,
            manifest: config.output.manifest,
        }
    }
}

/// What happened to one ref
#[derive(Debug)]
pub struct RefOutcome {
    pub git_ref: GitRef,
    /// Sanitized name used for the folder and archives
    pub stem: String,
    /// The exported folder, if export succeeded
    pub snapshot: Option<Snapshot>,
    /// Archives that were written
    pub archives: Vec<ArchiveFile>,
    /// Errors for this ref, in the order they happened
    pub errors: Vec<Error>,
    /// When the export finished
    pub exported_at: Option<SystemTime>,
}

impl RefOutcome {
    fn new(planned: PlannedRef) -> Self {
        Self {
            git_ref: planned.git_ref,
            stem: planned.stem,
            snapshot: None,
            archives: Vec::new(),
            errors: Vec::new(),
            exported_at: None,
        }
    }

    fn failed(planned: PlannedRef, err: Error) -> Self {
        let mut outcome = Self::new(planned);
        outcome.errors.push(err);
        outcome
    }

    /// Exported and every archive written
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Summary of a finished run
#[derive(Debug)]
pub struct RunReport {
    /// Repository location as given
    pub source: String,
    pub out_dir: PathBuf,
    pub started_at: SystemTime,
    /// One entry per enumerated ref: branches first, then tags, each sorted
    pub outcomes: Vec<RefOutcome>,
    /// Manifest location, when one was written
    pub manifest: Option<PathBuf>,
    /// Set when the manifest was enabled but could not be written
    pub manifest_error: Option<Error>,
    /// Workspace left on disk because of `keep_temp`
    pub kept_workspace: Option<PathBuf>,
}

impl RunReport {
    /// Refs exported and fully archived
    pub fn succeeded(&self) -> impl Iterator<Item = &RefOutcome> {
        self.outcomes.iter().filter(|o| o.is_success())
    }

    /// Refs with at least one error
    pub fn failed(&self) -> impl Iterator<Item = &RefOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Total archives written across all refs
    pub fn archive_count(&self) -> usize {
        self.outcomes.iter().map(|o| o.archives.len()).sum()
    }

    /// Whether every ref (and the manifest, if enabled) succeeded
    pub fn is_complete(&self) -> bool {
        self.failed().next().is_none() && self.manifest_error.is_none()
    }

    /// Process exit code for this report
    pub fn exit_code(&self) -> i32 {
        if self.is_complete() {
            EXIT_SUCCESS
        } else {
            EXIT_PARTIAL
        }
    }
}

/// Runs the archive pipeline for one repository
#[derive(Debug, Clone)]
pub struct Archiver {
    options: ArchiveOptions,
}

impl Archiver {
    pub fn new(options: ArchiveOptions) -> Self {
        Self { options }
    }

    /// Create the temporary workspace this run will clone into
    pub fn create_workspace(&self) -> Result<Workspace> {
        Workspace::create(self.options.tmp_dir.as_deref(), self.options.keep_temp)
    }

    /// Run end to end in a fresh workspace, released before returning
    pub fn run(&self) -> Result<RunReport> {
        let workspace = self.create_workspace()?;
        let result = self.run_in(workspace.path());
        let kept = workspace.close();

        let mut report = result?;
        report.kept_workspace = kept;
        Ok(report)
    }

    /// Run using `workspace` for the clone; the caller owns its cleanup
    pub fn run_in(&self, workspace: &Path) -> Result<RunReport> {
        let opts = &self.options;
        let started_at = SystemTime::now();
        let location = RepoLocation::parse(&opts.repo)?;

        let mirror = clone_mirror(&opts.git, &location, workspace)?;
        let repo = GitRepo::open(&mirror)?;
        export::prepare_repository(repo.root())?;

        let refs = list_refs(&opts.git, repo.root(), opts.include_tags)?;
        if refs.is_empty() {
            tracing::warn!(source = %location, "No branches found, nothing to archive");
        }

        fs::create_dir_all(&opts.out_dir).map_err(|e| {
            Error::Config(format!(
                "Cannot create output directory {}: {}",
                opts.out_dir.display(),
                e
            ))
        })?;

        let plan = OutputPlan::build(refs);
        let total = plan.accepted.len();
        let mut outcomes = Vec::with_capacity(total + plan.rejected.len());

        for (index, planned) in plan.accepted.into_iter().enumerate() {
            tracing::info!("[{}/{}] Archiving {}", index + 1, total, planned.git_ref);
            outcomes.push(self.archive_ref(&repo, planned));
        }

        for (planned, err) in plan.rejected {
            outcomes.push(RefOutcome::failed(planned, err));
        }
        outcomes.sort_by(|a, b| {
            (a.git_ref.kind, &a.git_ref.name).cmp(&(b.git_ref.kind, &b.git_ref.name))
        });

        let mut report = RunReport {
            source: opts.repo.clone(),
            out_dir: opts.out_dir.clone(),
            started_at,
            outcomes,
            manifest: None,
            manifest_error: None,
            kept_workspace: None,
        };

        if opts.manifest {
            match Manifest::new(&opts.repo, started_at, &report.outcomes).save(&opts.out_dir) {
                Ok(path) => report.manifest = Some(path),
                Err(e) => {
                    tracing::error!("{}", e);
                    report.manifest_error = Some(e);
                }
            }
        }

        tracing::info!(
            succeeded = report.succeeded().count(),
            failed = report.failed().count(),
            archives = report.archive_count(),
            "Run complete"
        );

        Ok(report)
    }

    /// Export one ref and write its archives
    fn archive_ref(&self, repo: &GitRepo, planned: PlannedRef) -> RefOutcome {
        let dest = self.options.out_dir.join(&planned.stem);

        let snapshot = match export::export_ref(&self.options.git, repo, &planned.git_ref, &dest) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!(ref_name = %planned.git_ref.name, "{}", e);
                return RefOutcome::failed(planned, e);
            }
        };

        let mut outcome = RefOutcome::new(planned);
        outcome.exported_at = Some(SystemTime::now());

        for result in archive::write_all(
            &snapshot.dir,
            &self.options.out_dir,
            &outcome.stem,
            &outcome.git_ref.name,
        ) {
            match result {
                Ok(file) => outcome.archives.push(file),
                Err(e) => {
                    tracing::error!(ref_name = %outcome.git_ref.name, "{}", e);
                    outcome.errors.push(e);
                }
            }
        }

        outcome.snapshot = Some(snapshot);
        outcome
    }
}
