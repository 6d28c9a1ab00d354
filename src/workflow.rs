//! GitHub Actions workflow integration.
//!
//! A step talks back to the runner through files named in its environment:
//!
//! - `GITHUB_OUTPUT`: `name=value` lines become step outputs
//! - `GITHUB_PATH`: each line is prepended to `PATH` for later steps
//!
//! and through `::warning::` / `::error::` workflow commands on stdout. Outside
//! a runner the same information is printed instead.

use colored::Colorize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct WorkflowEnv {
    pub output_file: Option<PathBuf>,
    pub path_file: Option<PathBuf>,
    /// Emit workflow commands for warnings and errors
    pub annotations: bool,
}

impl WorkflowEnv {
    /// Read the runner-provided files from the process environment
    pub fn from_env() -> Self {
        let non_empty = |name: &str| {
            std::env::var_os(name)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        };

        Self {
            output_file: non_empty("GITHUB_OUTPUT"),
            path_file: non_empty("GITHUB_PATH"),
            annotations: std::env::var("GITHUB_ACTIONS").is_ok_and(|v| v == "true"),
        }
    }

    /// Set a step output
    pub fn set_output(&self, name: &str, value: &str) -> std::io::Result<()> {
        match &self.output_file {
            Some(file) => append_line(file, &format!("{}={}", name, value)),
            None => {
                println!("{}={}", name, value);
                Ok(())
            }
        }
    }

    /// Make `dir` part of PATH for subsequent steps
    pub fn add_path(&self, dir: &Path) -> std::io::Result<()> {
        match &self.path_file {
            Some(file) => append_line(file, &dir.display().to_string()),
            None => {
                eprintln!(
                    "Add {} to your PATH to use the installed tool",
                    dir.display().to_string().cyan()
                );
                Ok(())
            }
        }
    }

    pub fn warning(&self, message: &str) {
        if self.annotations {
            println!("::warning::{}", escape_data(message));
        }
    }

    pub fn error(&self, message: &str) {
        if self.annotations {
            println!("::error::{}", escape_data(message));
        }
    }
}

fn append_line(file: &Path, line: &str) -> std::io::Result<()> {
    let mut f = OpenOptions::new().create(true).append(true).open(file)?;
    writeln!(f, "{}", line)
}

/// Workflow command data escaping
fn escape_data(message: &str) -> String {
    message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
