//! How the scheduler executes a single stage.

use std::path::PathBuf;
use std::process::Command;

use crate::app::pipeline::run_stage;
use crate::domain::{PipelineConfig, Stage};
use crate::error::AppError;

/// Environment variable carrying the FRED key to the fetch stage.
pub const API_KEY_ENV: &str = "FRED_API_KEY";

/// Executes one stage and reports a one-line success detail or the failure.
///
/// Implementations must not panic on stage failure; the scheduler relies on
/// the returned `Result` to keep later stages running.
pub trait StageRunner: Send + Sync {
    fn run(&self, stage: Stage) -> Result<String, AppError>;
}

/// Runs stages as plain function calls inside the current process.
#[derive(Debug, Clone)]
pub struct InProcessRunner {
    config: PipelineConfig,
}

impl InProcessRunner {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }
}

impl StageRunner for InProcessRunner {
    fn run(&self, stage: Stage) -> Result<String, AppError> {
        run_stage(stage, &self.config).map(|out| out.to_string())
    }
}

/// Runs each stage as its own `etl <stage>` child process.
///
/// Exit status 0 is success; anything else becomes [`AppError::StageFailed`].
#[derive(Debug, Clone)]
pub struct SubprocessRunner {
    program: PathBuf,
    config: PipelineConfig,
}

impl SubprocessRunner {
    pub fn new(program: impl Into<PathBuf>, config: PipelineConfig) -> Self {
        Self {
            program: program.into(),
            config,
        }
    }

    /// Re-invoke the binary that is currently running.
    pub fn current_exe(config: PipelineConfig) -> Result<Self, AppError> {
        let program = std::env::current_exe().map_err(|e| AppError::io("failed to locate the etl executable", e))?;
        Ok(Self::new(program, config))
    }

    fn command(&self, stage: Stage) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg(stage.command_name()).args(self.config.to_cli_args());
        if let Some(key) = &self.config.api_key {
            cmd.env(API_KEY_ENV, key);
        }
        cmd
    }
}

impl StageRunner for SubprocessRunner {
    fn run(&self, stage: Stage) -> Result<String, AppError> {
        let status = self
            .command(stage)
            .status()
            .map_err(|e| AppError::io(format_args!("failed to launch '{}'", self.program.display()), e))?;

        if status.success() {
            Ok(format!("child process exited with {status}"))
        } else {
            Err(AppError::StageFailed {
                stage: stage.command_name().to_string(),
                code: status.code(),
            })
        }
    }
}
