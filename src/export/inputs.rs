//! Checks that a job's inputs exist before any work is done, and finds the
//! available timesteps when the caller asked for all of them.

use std::fs;
use std::path::Path;

use log::{debug, info};

use crate::error::{Error, Result};
use crate::export::job::{JobDescriptor, Location, Source};
use crate::remote::{RemoteAccess, TransportSession};
use crate::timesteps::Timestep;

/// Fails early for output directives that are not implemented.
pub fn ensure_supported(job: &JobDescriptor) -> Result<()> {
    if job.output.upload {
        return Err(Error::UnsupportedOperation(
            "uploading exports over sftp".to_string(),
        ));
    }
    Ok(())
}

/// Returns the remote access, or a configuration error naming `what`.
pub fn require_remote<'a>(
    remote: Option<&'a RemoteAccess>,
    what: &str,
) -> Result<&'a RemoteAccess> {
    remote.ok_or_else(|| {
        Error::Configuration(format!(
            "sftp support is not available, but {} is on sftp",
            what
        ))
    })
}

fn missing(source: &Source) -> Error {
    match source.location {
        Location::Local => {
            Error::Validation(format!("{} is not valid locally", source.path.display()))
        }
        Location::Remote => {
            Error::Validation(format!("{} is not valid on sftp", source.path.display()))
        }
    }
}

/// Verifies the res file, the trn directory and every requested trn file.
pub fn verify(job: &JobDescriptor, remote: Option<&RemoteAccess>) -> Result<()> {
    ensure_supported(job)?;
    verify_sources(&job.res_file, &job.trn_dir, remote)?;
    verify_timesteps(job, remote)
}

/// Checks that the res file and the trn directory exist.
///
/// Whatever lives on the remote is checked within a single session.
pub fn verify_sources(
    res_file: &Source,
    trn_dir: &Source,
    remote: Option<&RemoteAccess>,
) -> Result<()> {
    let mut session: Option<TransportSession> = None;

    let checks = [
        (res_file, "the res file", false),
        (trn_dir, "the trn directory", true),
    ];
    for (source, what, is_dir) in checks {
        let present = match source.location {
            Location::Local if is_dir => source.path.is_dir(),
            Location::Local => source.path.is_file(),
            Location::Remote => {
                if session.is_none() {
                    session = Some(require_remote(remote, what)?.session()?);
                }
                match session.as_mut() {
                    Some(session) => session.exists(&source.path)?,
                    None => false,
                }
            }
        };
        if !present {
            return Err(missing(source));
        }
    }

    if let Some(session) = session {
        session.close()?;
    }
    Ok(())
}

/// Checks that a trn file exists for every selected timestep.
///
/// Remote checks share a single session.
pub fn verify_timesteps(job: &JobDescriptor, remote: Option<&RemoteAccess>) -> Result<()> {
    if job.timesteps.is_empty() {
        return Err(Error::Validation("no timesteps selected".to_string()));
    }

    if job.trn_dir.is_remote() {
        let access = require_remote(remote, "the trn directory")?;
        access.with_session(|session| {
            for t in &job.timesteps {
                let path = job.trn_source(t);
                if !session.exists(&path)? {
                    return Err(missing(&Source::remote(path)));
                }
            }
            Ok(())
        })?;
    } else {
        for t in &job.timesteps {
            let path = job.trn_source(t);
            if !path.exists() {
                return Err(missing(&Source::local(path)));
            }
        }
    }

    info!(
        "verified {} and {} timesteps in {}",
        job.res_file.describe(),
        job.timesteps.len(),
        job.trn_dir.describe()
    );
    Ok(())
}

/// Lists the timesteps present in a trn directory, in ascending order.
pub fn discover_timesteps(trn_dir: &Source, remote: Option<&RemoteAccess>) -> Result<Vec<Timestep>> {
    let names = if trn_dir.is_remote() {
        let access = require_remote(remote, "the trn directory")?;
        access.with_session(|session: &mut TransportSession| {
            if !session.exists(&trn_dir.path)? {
                return Err(missing(trn_dir));
            }
            session.list(&trn_dir.path)
        })?
    } else {
        list_local(&trn_dir.path).map_err(|_| missing(trn_dir))?
    };

    let timesteps = timesteps_from_names(names.iter().map(String::as_str));
    if timesteps.is_empty() {
        return Err(Error::Validation(format!(
            "no .trn files found in {}",
            trn_dir.describe()
        )));
    }

    debug!("discovered {} timesteps in {}", timesteps.len(), trn_dir.describe());
    Ok(timesteps)
}

fn list_local(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        names.push(entry?.file_name().to_string_lossy().to_string());
    }
    Ok(names)
}

/// Picks `<digits>.trn` names and orders them numerically.
pub fn timesteps_from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<Timestep> {
    let mut found: Vec<(u64, String)> = names
        .into_iter()
        .filter_map(|name| name.strip_suffix(".trn"))
        .filter(|stem| !stem.is_empty() && stem.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|stem| stem.parse::<u64>().ok().map(|n| (n, stem.to_string())))
        .collect();
    found.sort();
    found.dedup();
    found
        .into_iter()
        .map(|(_, stem)| Timestep::Literal(stem))
        .collect()
}
