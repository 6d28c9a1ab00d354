//! Step outputs for the resolved installation

use crate::install::InstallResult;
use crate::resolve::ResolvedRelease;
use crate::workflow::WorkflowEnv;
use tracing::warn;

pub const OUTPUT_VERSION: &str = "version";
pub const OUTPUT_PATH: &str = "path";
pub const OUTPUT_CACHE_HIT: &str = "cache-hit";

pub struct Reporter {
    env: WorkflowEnv,
}

impl Reporter {
    pub fn new(env: WorkflowEnv) -> Self {
        Self { env }
    }

    /// Emit `version`, `path` and `cache-hit`. Never fails; write errors are logged.
    pub fn report(&self, resolved: &ResolvedRelease, install: &InstallResult) {
        let outputs = [
            (OUTPUT_VERSION, resolved.tag.clone()),
            (OUTPUT_PATH, install.binary_path.display().to_string()),
            (OUTPUT_CACHE_HIT, install.cache_hit.to_string()),
        ];

        for (name, value) in outputs {
            if let Err(e) = self.env.set_output(name, &value) {
                warn!(output = name, error = %e, "Failed to set output");
                self.env
                    .warning(&format!("Failed to set output {}: {}", name, e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn resolved() -> ResolvedRelease {
        ResolvedRelease {
            tag: "v2.1.0".into(),
            asset_url: "https://github.com/o/tool/releases/download/v2.1.0/tool_linux_amd64.tar.gz"
                .into(),
            asset_name: "tool_linux_amd64.tar.gz".into(),
        }
    }

    #[test]
    fn test_report_writes_three_outputs() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("output");
        let reporter = Reporter::new(WorkflowEnv {
            output_file: Some(output.clone()),
            ..Default::default()
        });

        reporter.report(
            &resolved(),
            &InstallResult {
                binary_path: PathBuf::from("/opt/tool/tool"),
                cache_hit: true,
            },
        );

        assert_eq!(
            std::fs::read_to_string(output).unwrap(),
            "version=v2.1.0\npath=/opt/tool/tool\ncache-hit=true\n"
        );
    }

    #[test]
    fn test_report_survives_unwritable_output() {
        let temp = TempDir::new().unwrap();
        let reporter = Reporter::new(WorkflowEnv {
            // A directory cannot be opened for appending
            output_file: Some(temp.path().to_path_buf()),
            ..Default::default()
        });

        reporter.report(
            &resolved(),
            &InstallResult {
                binary_path: PathBuf::from("/opt/tool/tool"),
                cache_hit: false,
            },
        );
    }
}
