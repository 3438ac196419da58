//! Shell completion scripts for the cfdbox command line.

use anyhow::{anyhow, Context, Result};
use clap::{Args, CommandFactory};
use clap_complete::{generate, Shell};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::Cli;

#[derive(Args)]
#[command(about = "Print a shell completion script")]
pub struct CompletionsCommand {
    /// Target shell; detected from $SHELL when omitted
    #[arg(value_enum)]
    pub shell: Option<Shell>,

    /// Write the script to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl CompletionsCommand {
    pub fn execute(self) -> Result<()> {
        let shell = self
            .shell
            .or_else(Shell::from_env)
            .ok_or_else(|| anyhow!("cannot detect the shell from $SHELL; name it explicitly"))?;

        match &self.output {
            Some(path) => {
                let mut file = File::create(path)
                    .with_context(|| format!("cannot create {}", path.display()))?;
                write_script(shell, &mut file)?;
                file.flush()?;
            }
            None => write_script(shell, &mut io::stdout().lock())?,
        }
        Ok(())
    }
}

fn write_script(shell: Shell, out: &mut dyn Write) -> Result<()> {
    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, out);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_script_written_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cfdbox.bash");

        CompletionsCommand {
            shell: Some(Shell::Bash),
            output: Some(path.clone()),
        }
        .execute()
        .unwrap();

        let script = std::fs::read_to_string(&path).unwrap();
        assert!(script.contains("cfdbox"));
        assert!(script.contains("export-cgns"));
    }
}
