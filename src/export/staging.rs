//! Run directory preparation.
//!
//! Every run gets its own directory under the local tmp root:
//!
//! ```text
//! {tmp_root}/{job}-{YYYYMMDDHHMMSS}/
//!     {job}/            staged trn files
//!     {job}.res         staged res file
//!     cgns-exports/     export output (unless an export dir was given)
//! ```
//!
//! Local inputs are hard linked in rather than copied. Remote res files are
//! downloaded once here; remote trn files are fetched one timestep at a time
//! by the pipeline.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::export::inputs::require_remote;
use crate::export::job::JobDescriptor;
use crate::remote::RemoteAccess;
use crate::timesteps::Timestep;

const EXPORT_SUBDIR: &str = "cgns-exports";

/// How the trn files were made available in the run directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrnStaging {
    /// One hard link per requested trn file.
    HardLinked,
    /// The staging directory is a symlink to the source directory, used when
    /// the source sits on another filesystem.
    Symlinked,
    /// Nothing staged up front; each trn file is downloaded when needed.
    OnDemand,
}

/// Absolute locations used by one run.
#[derive(Debug, Clone, PartialEq)]
pub struct StagingPaths {
    pub base_dir: PathBuf,
    pub trn_dir: PathBuf,
    pub res_path: PathBuf,
    pub export_dir: PathBuf,
    pub trn_staging: TrnStaging,
}

impl StagingPaths {
    /// Staged location of the trn file for `timestep`.
    pub fn trn_path(&self, timestep: &Timestep) -> PathBuf {
        self.trn_dir.join(timestep.trn_file_name())
    }

    /// Output path handed to the exporter, which appends `.cgns` itself.
    pub fn export_base(&self, timestep: &Timestep) -> PathBuf {
        self.export_dir.join(timestep.to_string())
    }

    pub fn export_file(&self, timestep: &Timestep) -> PathBuf {
        self.export_dir.join(format!("{}.cgns", timestep))
    }
}

/// Name of the run directory for a job started at `timestamp`.
pub fn run_dir_name(job_stem: &str, timestamp: NaiveDateTime) -> String {
    format!("{}-{}", job_stem, timestamp.format("%Y%m%d%H%M%S"))
}

/// Prepares the run directory for `job`, timestamped with the current time.
pub fn prepare(job: &JobDescriptor, remote: Option<&RemoteAccess>) -> Result<StagingPaths> {
    prepare_at(job, remote, Local::now().naive_local())
}

/// Prepares the run directory for `job` as if started at `timestamp`.
pub fn prepare_at(
    job: &JobDescriptor,
    remote: Option<&RemoteAccess>,
    timestamp: NaiveDateTime,
) -> Result<StagingPaths> {
    prepare_with(job, remote, timestamp, |from, to| fs::hard_link(from, to))
}

/// Creates a hard link; replaced in tests to simulate filesystem limits.
type LinkFn = fn(&Path, &Path) -> io::Result<()>;

fn prepare_with(
    job: &JobDescriptor,
    remote: Option<&RemoteAccess>,
    timestamp: NaiveDateTime,
    link: LinkFn,
) -> Result<StagingPaths> {
    let job_stem = job.job_stem()?;
    let tmp_root = std::path::absolute(&job.local_tmp_dir)?;
    let base_dir = tmp_root.join(run_dir_name(&job_stem, timestamp));
    info!("run basedir: {}", base_dir.display());

    let trn_dir = base_dir.join(&job_stem);
    let res_path = base_dir.join(job.res_file_name()?);
    mkdir_p(&base_dir)?;

    let trn_staging = if job.trn_dir.is_remote() {
        mkdir_p(&trn_dir)?;
        TrnStaging::OnDemand
    } else {
        stage_trn_files(&job.trn_dir.path, &trn_dir, &job.timesteps, link)?
    };

    if job.res_file.is_remote() {
        let access = require_remote(remote, "the res file")?;
        access.download(&job.res_file.path, &res_path)?;
    } else {
        stage_res_file(&job.res_file.path, &res_path, link)?;
    }

    let export_dir = match &job.export_dir {
        Some(dir) => std::path::absolute(dir)?,
        None => base_dir.join(EXPORT_SUBDIR),
    };
    mkdir_p(&export_dir)?;
    info!("export dir will be: {}", export_dir.display());

    Ok(StagingPaths {
        base_dir,
        trn_dir,
        res_path,
        export_dir,
        trn_staging,
    })
}

/// Creates `path` and its parents; an existing directory is fine.
fn mkdir_p(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| {
        Error::Io(io::Error::new(
            e.kind(),
            format!("cannot create {}: {}", path.display(), e),
        ))
    })
}

/// Hard linking is impossible across filesystems and on some network mounts.
fn link_unsupported(e: &io::Error) -> bool {
    matches!(e.kind(), ErrorKind::CrossesDevices | ErrorKind::Unsupported)
}

fn stage_trn_files(
    source_dir: &Path,
    trn_dir: &Path,
    timesteps: &[Timestep],
    link: LinkFn,
) -> Result<TrnStaging> {
    let source_dir = std::path::absolute(source_dir)?;
    mkdir_p(trn_dir)?;

    for t in timesteps {
        let from = source_dir.join(t.trn_file_name());
        let to = trn_dir.join(t.trn_file_name());
        match link(&from, &to) {
            Ok(()) => debug!("{} -> {}", from.display(), to.display()),
            Err(e) if link_unsupported(&e) => {
                warn!(
                    "cannot hard link trn files from {} ({}), symlinking the directory instead; \
                     trn files removed after export are removed from the source directory",
                    source_dir.display(),
                    e
                );
                fs::remove_dir_all(trn_dir)?;
                symlink_dir(&source_dir, trn_dir)?;
                info!("{} -> {}", source_dir.display(), trn_dir.display());
                return Ok(TrnStaging::Symlinked);
            }
            Err(e) => {
                return Err(Error::Io(io::Error::new(
                    e.kind(),
                    format!("cannot link {} -> {}: {}", from.display(), to.display(), e),
                )))
            }
        }
    }

    info!(
        "linked {} trn files from {} into {}",
        timesteps.len(),
        source_dir.display(),
        trn_dir.display()
    );
    Ok(TrnStaging::HardLinked)
}

fn stage_res_file(source: &Path, res_path: &Path, link: LinkFn) -> Result<()> {
    let source = std::path::absolute(source)?;
    match link(&source, res_path) {
        Ok(()) => {}
        Err(e) if link_unsupported(&e) => {
            warn!(
                "cannot hard link {} ({}), copying it instead",
                source.display(),
                e
            );
            fs::copy(&source, res_path)?;
        }
        Err(e) => {
            return Err(Error::Io(io::Error::new(
                e.kind(),
                format!(
                    "cannot link {} -> {}: {}",
                    source.display(),
                    res_path.display(),
                    e
                ),
            )))
        }
    }
    info!("{} -> {}", source.display(), res_path.display());
    Ok(())
}

#[cfg(unix)]
fn symlink_dir(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

#[cfg(windows)]
fn symlink_dir(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(src, dst)
}
