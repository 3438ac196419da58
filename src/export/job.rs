use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::timesteps::Timestep;

/// Where an input lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Local,
    Remote,
}

/// An input path together with where to find it.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub path: PathBuf,
    pub location: Location,
}

impl Source {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            location: Location::Local,
        }
    }

    pub fn remote(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            location: Location::Remote,
        }
    }

    pub fn new(path: impl Into<PathBuf>, remote: bool) -> Self {
        if remote {
            Self::remote(path)
        } else {
            Self::local(path)
        }
    }

    pub fn is_remote(&self) -> bool {
        self.location == Location::Remote
    }

    /// Human readable description used in error messages.
    pub fn describe(&self) -> String {
        match self.location {
            Location::Local => format!("{} (local)", self.path.display()),
            Location::Remote => format!("{} (sftp)", self.path.display()),
        }
    }
}

/// What happens to each exported file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputOptions {
    pub gzip: bool,
    pub upload: bool,
}

/// Everything one export run needs to know.
#[derive(Debug, Clone)]
pub struct JobDescriptor {
    pub res_file: Source,
    pub trn_dir: Source,
    pub timesteps: Vec<Timestep>,
    /// Forwarded verbatim to the exporter
    pub extra_args: Vec<OsString>,
    pub output: OutputOptions,
    /// Export destination; a subdirectory of the run directory when unset
    pub export_dir: Option<PathBuf>,
    /// Root under which the run directory is created
    pub local_tmp_dir: PathBuf,
}

impl JobDescriptor {
    pub fn new(
        res_file: Source,
        trn_dir: Source,
        timesteps: Vec<Timestep>,
        local_tmp_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            res_file,
            trn_dir,
            timesteps,
            extra_args: Vec::new(),
            output: OutputOptions::default(),
            export_dir: None,
            local_tmp_dir: local_tmp_dir.into(),
        }
    }

    pub fn with_gzip(mut self, gzip: bool) -> Self {
        self.output.gzip = gzip;
        self
    }

    pub fn with_upload(mut self, upload: bool) -> Self {
        self.output.upload = upload;
        self
    }

    pub fn with_extra_args(mut self, extra_args: Vec<OsString>) -> Self {
        self.extra_args = extra_args;
        self
    }

    pub fn with_export_dir(mut self, export_dir: Option<PathBuf>) -> Self {
        self.export_dir = export_dir;
        self
    }

    /// Job name: the res file name without its extension.
    pub fn job_stem(&self) -> Result<String> {
        self.res_file
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(|| {
                Error::Validation(format!(
                    "{} does not name a file",
                    self.res_file.path.display()
                ))
            })
    }

    pub fn res_file_name(&self) -> Result<OsString> {
        self.res_file
            .path
            .file_name()
            .map(|s| s.to_os_string())
            .ok_or_else(|| {
                Error::Validation(format!(
                    "{} does not name a file",
                    self.res_file.path.display()
                ))
            })
    }

    /// True when any input has to be fetched over the transport.
    pub fn needs_remote(&self) -> bool {
        self.res_file.is_remote() || self.trn_dir.is_remote() || self.output.upload
    }

    /// Source path of the trn file for `timestep`.
    pub fn trn_source(&self, timestep: &Timestep) -> PathBuf {
        self.trn_dir.path.join(timestep.trn_file_name())
    }
}

/// The solver writes `<job>.res` next to a `<job>/` directory holding the
/// per-timestep trn files.
pub fn default_trn_dir(res_file: &Path) -> PathBuf {
    res_file.with_extension("")
}
