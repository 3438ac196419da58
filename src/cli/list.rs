use anyhow::Result;
use clap::{Args, CommandFactory};

use crate::Cli;

#[derive(Args)]
#[command(about = "List the available commands")]
pub struct ListCommand {}

impl ListCommand {
    pub fn execute(self) -> Result<()> {
        for name in command_names() {
            println!("- {}", name);
        }
        Ok(())
    }
}

/// Names of all registered subcommands, sorted.
fn command_names() -> Vec<String> {
    let mut names: Vec<String> = Cli::command()
        .get_subcommands()
        .map(|c| c.get_name().to_string())
        .filter(|name| name != "help")
        .collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_names() {
        assert_eq!(
            command_names(),
            vec!["completions", "config", "export-cgns", "list"]
        );
    }
}
