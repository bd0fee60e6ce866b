//! Pipeline file checking command.

use clap::Args;
use sluice_config::{PipelineConfig, ValidationError};
use std::path::PathBuf;

#[derive(Args)]
pub struct ValidateArgs {
    /// Pipeline files (TOML)
    #[arg(value_name = "PIPELINE", required = true)]
    pipelines: Vec<PathBuf>,
}

fn report(err: &ValidationError) {
    match err {
        ValidationError::Multiple(errors) => {
            for e in errors {
                println!("  - {e}");
            }
        }
        other => println!("  - {other}"),
    }
}

pub fn run(args: ValidateArgs) -> anyhow::Result<()> {
    let mut failed = 0;

    for path in &args.pipelines {
        let result = PipelineConfig::load(path).and_then(|pipeline| {
            pipeline.validate()?;
            Ok(pipeline)
        });
        match result {
            Ok(pipeline) => {
                println!(
                    "{}: ok ({})",
                    path.display(),
                    pipeline.block_types().join(" -> ")
                );
            }
            Err(sluice_config::ConfigError::Validation(err)) => {
                failed += 1;
                println!("{}: invalid", path.display());
                report(&err);
            }
            Err(err) => {
                failed += 1;
                println!("{}: {err}", path.display());
            }
        }
    }

    tracing::debug!(checked = args.pipelines.len(), failed, "validate_done");
    if failed > 0 {
        anyhow::bail!("{failed} of {} pipeline(s) failed validation", args.pipelines.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const GOOD: &str = r#"
name = "good"

[[blocks]]
type = "null_source"

[[blocks]]
type = "null_sink"
"#;

    #[test]
    fn reports_failure_when_any_file_is_invalid() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.toml");
        let bad = dir.path().join("bad.toml");
        std::fs::write(&good, GOOD).unwrap();
        std::fs::write(&bad, "name = \"bad\"\n[[blocks]]\ntype = \"fft\"\n").unwrap();

        assert!(
            run(ValidateArgs {
                pipelines: vec![good.clone()],
            })
            .is_ok()
        );
        let err = run(ValidateArgs {
            pipelines: vec![good, bad],
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "1 of 2 pipeline(s) failed validation");
    }
}
