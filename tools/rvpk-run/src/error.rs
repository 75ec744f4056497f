use std::path::PathBuf;
use std::process::ExitCode;

use rvpk_kernel::boot::BootError;
use rvpk_kernel::loader::ElfError;
use rvpk_kernel::Fault;

/// All errors produced by rvpk-run.
///
/// Variants are split into two categories:
/// - **Infrastructure errors** (exit code 2): unreadable files, bad arguments, output failures
/// - **Guest errors** (exit code 1): the image would not boot or the kernel halted
#[derive(thiserror::Error, Debug)]
pub enum RunError {
    // ── Infrastructure errors (exit code 2) ──────────────────────────

    #[error("Cannot open application image {path}: {source}")]
    ImageOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Application path is not valid UTF-8: {path}")]
    NonUtf8Path { path: PathBuf },

    #[error("Invalid command line: {0}")]
    Args(BootError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Guest errors (exit code 1) ───────────────────────────────────

    #[error("{0}")]
    Boot(BootError),

    #[error("Kernel halted: {0}")]
    Fault(Fault),
}

impl RunError {
    /// Map each error variant to its process exit code.
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.exit_status())
    }

    /// Raw numeric form of [`exit_code`](Self::exit_code).
    pub fn exit_status(&self) -> u8 {
        match self {
            Self::ImageOpen { .. }
            | Self::NonUtf8Path { .. }
            | Self::Args(_)
            | Self::Io(_)
            | Self::Json(_) => 2,

            Self::Boot(_) | Self::Fault(_) => 1,
        }
    }
}

impl From<BootError> for RunError {
    fn from(e: BootError) -> Self {
        match e {
            BootError::MissingApplication | BootError::TooManyArgs(_) => Self::Args(e),
            BootError::NoFreeProcess | BootError::Elf(_) => Self::Boot(e),
        }
    }
}

impl From<ElfError> for RunError {
    fn from(e: ElfError) -> Self {
        Self::Boot(BootError::Elf(e))
    }
}

impl From<Fault> for RunError {
    fn from(f: Fault) -> Self {
        Self::Fault(f)
    }
}

/// Clamp a guest exit code into the host's 0-255 range.
pub fn clamp_exit_code(code: i64) -> u8 {
    code.clamp(0, i64::from(u8::MAX)) as u8
}
