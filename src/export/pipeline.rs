//! Per-timestep export driver.
//!
//! Each timestep goes through the same fixed sequence:
//!
//! 1. fetch the trn file (remote trn directories only)
//! 2. run the exporter
//! 3. remove the staged trn file
//! 4. gzip the export (optional)
//! 5. upload and remove the export (not supported)
//!
//! The first failing step aborts the run. Exports of earlier timesteps stay
//! where they are.

use std::ffi::OsString;

use log::info;

use crate::config::ToolSettings;
use crate::error::{Error, Result};
use crate::export::inputs::{ensure_supported, require_remote};
use crate::export::job::JobDescriptor;
use crate::export::staging::{self, StagingPaths};
use crate::process::CommandRunner;
use crate::remote::RemoteAccess;
use crate::timesteps::Timestep;

/// External executables used by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportTools {
    pub export: OsString,
    pub gzip: OsString,
}

impl Default for ExportTools {
    fn default() -> Self {
        Self::from(&ToolSettings::default())
    }
}

impl From<&ToolSettings> for ExportTools {
    fn from(settings: &ToolSettings) -> Self {
        Self {
            export: OsString::from(&settings.export),
            gzip: OsString::from(&settings.gzip),
        }
    }
}

pub struct ExportPipeline<'a> {
    tools: ExportTools,
    runner: &'a dyn CommandRunner,
    remote: Option<&'a RemoteAccess>,
}

impl<'a> ExportPipeline<'a> {
    pub fn new(tools: ExportTools, runner: &'a dyn CommandRunner) -> Self {
        Self {
            tools,
            runner,
            remote: None,
        }
    }

    pub fn with_remote(mut self, remote: Option<&'a RemoteAccess>) -> Self {
        self.remote = remote;
        self
    }

    /// Stages the job and exports every timestep.
    pub fn run(&self, job: &JobDescriptor) -> Result<StagingPaths> {
        ensure_supported(job)?;
        let paths = staging::prepare(job, self.remote)?;
        self.run_staged(job, &paths)?;
        Ok(paths)
    }

    /// Exports every timestep into an already prepared run directory.
    pub fn run_staged(&self, job: &JobDescriptor, paths: &StagingPaths) -> Result<()> {
        ensure_supported(job)?;

        let total = job.timesteps.len();
        for (i, t) in job.timesteps.iter().enumerate() {
            info!("timestep {} ({}/{})", t, i + 1, total);
            self.process_timestep(job, paths, t)?;
        }

        info!("exported {} timesteps into {}", total, paths.export_dir.display());
        Ok(())
    }

    fn process_timestep(&self, job: &JobDescriptor, paths: &StagingPaths, t: &Timestep) -> Result<()> {
        if job.trn_dir.is_remote() {
            self.download_trn(job, paths, t)?;
        }

        self.export(job, paths, t)?;
        self.delete_trn(paths, t)?;

        if job.output.gzip {
            self.compress(paths, t)?;
        }

        if job.output.upload {
            self.upload(paths, t)?;
            self.delete_export(paths, t)?;
        }

        Ok(())
    }

    fn download_trn(&self, job: &JobDescriptor, paths: &StagingPaths, t: &Timestep) -> Result<()> {
        let access = require_remote(self.remote, "the trn directory")?;
        access.download(&job.trn_source(t), &paths.trn_path(t))?;
        Ok(())
    }

    fn export(&self, job: &JobDescriptor, paths: &StagingPaths, t: &Timestep) -> Result<()> {
        self.runner.run(&self.export_command(job, paths, t))
    }

    /// `<export> -cgns -out <dir/t> -t <t> [extra...] <res>`
    pub fn export_command(&self, job: &JobDescriptor, paths: &StagingPaths, t: &Timestep) -> Vec<OsString> {
        let mut cmd: Vec<OsString> = vec![
            self.tools.export.clone(),
            "-cgns".into(),
            "-out".into(),
            paths.export_base(t).into_os_string(),
            "-t".into(),
            t.to_string().into(),
        ];
        cmd.extend(job.extra_args.iter().cloned());
        cmd.push(paths.res_path.clone().into_os_string());
        cmd
    }

    fn delete_trn(&self, paths: &StagingPaths, t: &Timestep) -> Result<()> {
        let path = paths.trn_path(t);
        std::fs::remove_file(&path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("cannot remove {}: {}", path.display(), e),
            ))
        })
    }

    fn compress(&self, paths: &StagingPaths, t: &Timestep) -> Result<()> {
        self.runner.run(&self.compress_command(paths, t))
    }

    /// `<gzip> <dir/t>.cgns`
    pub fn compress_command(&self, paths: &StagingPaths, t: &Timestep) -> Vec<OsString> {
        vec![
            self.tools.gzip.clone(),
            paths.export_file(t).into_os_string(),
        ]
    }

    fn upload(&self, _paths: &StagingPaths, _t: &Timestep) -> Result<()> {
        Err(Error::UnsupportedOperation(
            "uploading exports over sftp".to_string(),
        ))
    }

    fn delete_export(&self, _paths: &StagingPaths, _t: &Timestep) -> Result<()> {
        Err(Error::UnsupportedOperation(
            "removing uploaded exports".to_string(),
        ))
    }
}
