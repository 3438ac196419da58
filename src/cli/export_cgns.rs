//! Exports CFX results into CGNS, one timestep at a time, by driving
//! `cfx5export` and optionally `gzip`.
//!
//! Result files that only exist on the storage server can be fetched over
//! SFTP instead of read from a mounted filesystem.

use anyhow::{anyhow, Result};
use clap::Args;
use log::{error, info};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use cfdbox::config::Config;
use cfdbox::error::Error;
use cfdbox::export::{
    default_trn_dir, discover_timesteps, verify_sources, verify_timesteps, ExportPipeline,
    ExportTools, JobDescriptor, Source,
};
use cfdbox::process::ProcessRunner;
use cfdbox::remote::{diagnose_connection_error, RemoteAccess, RetryConfig, SftpConnector};
use cfdbox::timesteps::TimestepRange;

use super::load_config;

#[derive(Args)]
#[command(about = "Export CFX results into CGNS")]
pub struct ExportCgnsCommand {
    #[arg(long, help = "Locate the trn files over sftp")]
    pub sftp_trn: bool,

    #[arg(long, help = "Locate the res file over sftp")]
    pub sftp_res: bool,

    #[arg(long, help = "Upload exports over sftp (not supported yet)")]
    pub sftp_export: bool,

    #[arg(long, help = "Gzip each export after it is written")]
    pub gzip_export: bool,

    #[arg(
        long,
        help = "Directory the run starts from; local inputs are hard linked and downloads land here (default: $HOME/tmp)"
    )]
    pub local_tmp_dir: Option<PathBuf>,

    #[arg(
        short,
        long,
        required = true,
        help = "Timesteps to export: '*', N, START-END or START-END-STEP (END inclusive)"
    )]
    pub timesteps: String,

    #[arg(
        short = 'd',
        long,
        help = "Directory holding the trn files (default: the res path without its extension)"
    )]
    pub trn_directory: Option<PathBuf>,

    #[arg(help = "Path to the .res file to export from")]
    pub res_file: PathBuf,

    #[arg(help = "Directory for the exported files (default: a subdirectory of the run directory)")]
    pub export_dir: Option<PathBuf>,

    #[arg(last = true, help = "Extra arguments passed to the exporter as-is")]
    pub extra_args: Vec<OsString>,
}

impl ExportCgnsCommand {
    pub fn execute(self, config_path: Option<&Path>) -> Result<()> {
        if self.sftp_export {
            return Err(Error::UnsupportedOperation("uploading exports over sftp".to_string()).into());
        }

        let config = load_config(config_path)?;

        let remote = if self.sftp_trn || self.sftp_res {
            Some(remote_access(&config)?)
        } else {
            None
        };

        let result = self.run(&config, remote.as_ref());
        if let (Err(e), Some(access)) = (&result, &remote) {
            let connect_failed = match e.downcast_ref::<Error>() {
                Some(Error::ConnectionExhausted { .. }) => true,
                Some(Error::Transfer(msg)) => msg.starts_with("cannot connect"),
                _ => false,
            };
            if connect_failed {
                error!("{}", diagnose_connection_error(&e.to_string(), access.config()));
            }
        }
        result
    }

    fn run(self, config: &Config, remote: Option<&RemoteAccess>) -> Result<()> {
        let trn_dir = self
            .trn_directory
            .clone()
            .unwrap_or_else(|| default_trn_dir(&self.res_file));
        let trn_source = Source::new(trn_dir, self.sftp_trn);
        let res_source = Source::new(self.res_file.clone(), self.sftp_res);
        verify_sources(&res_source, &trn_source, remote)?;

        let range: TimestepRange = self.timesteps.parse().map_err(|e| match e {
            Error::InvalidRangeFormat { .. } => {
                anyhow!("timesteps must be in standard format ({})", e)
            }
            other => other.into(),
        })?;

        let timesteps = if range.is_all() {
            discover_timesteps(&trn_source, remote)?
        } else {
            range.timesteps()
        };
        info!("{} timesteps selected ({})", timesteps.len(), range);

        let local_tmp_dir = self
            .local_tmp_dir
            .clone()
            .unwrap_or_else(|| config.local_tmp_dir());

        let job = JobDescriptor::new(res_source, trn_source, timesteps, local_tmp_dir)
            .with_gzip(self.gzip_export)
            .with_upload(self.sftp_export)
            .with_extra_args(self.extra_args)
            .with_export_dir(self.export_dir);

        verify_timesteps(&job, remote)?;

        let runner = ProcessRunner;
        let pipeline =
            ExportPipeline::new(ExportTools::from(&config.tools), &runner).with_remote(remote);
        let paths = pipeline.run(&job)?;

        println!("exports written to {}", paths.export_dir.display());
        Ok(())
    }
}

fn remote_access(config: &Config) -> Result<RemoteAccess> {
    let transport = config.transport_config()?;
    Ok(RemoteAccess::new(
        Box::new(SftpConnector),
        transport,
        RetryConfig::from_settings(&config.transport),
    ))
}
