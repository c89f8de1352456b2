//! Exit code constants and error mapping for waveforge.
//!
//! # Exit Code Table
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Run or command completed successfully |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `CLI_ARGS` | Invalid CLI arguments or configuration |
//! | 3 | `INVALID_PLAN` | Plan failed structural validation |
//! | 4 | `QUALITY_GATE_FAILED` | Quality gate did not pass |
//! | 5 | `BUDGET_EXHAUSTED` | A budget ceiling stopped the run |
//! | 130 | `CANCELLED` | Run was cancelled |

use crate::error::{DelegateError, WaveforgeError};

/// Process exit code for waveforge commands.
///
/// The numeric values are part of the public contract.
///
/// ```rust
/// use waveforge_utils::exit_codes::ExitCode;
///
/// assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
/// assert_eq!(ExitCode::from_i32(3), ExitCode::INVALID_PLAN);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Success
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Internal error - general failure
    pub const INTERNAL: ExitCode = ExitCode(1);

    /// Invalid CLI arguments or configuration
    pub const CLI_ARGS: ExitCode = ExitCode(2);

    /// Plan has duplicate ids, dangling references, unknown kinds or a cycle
    pub const INVALID_PLAN: ExitCode = ExitCode(3);

    /// Quality gate failed after the repair rounds were used up
    pub const QUALITY_GATE_FAILED: ExitCode = ExitCode(4);

    /// Tool-call, iteration or duration budget was exhausted
    pub const BUDGET_EXHAUSTED: ExitCode = ExitCode(5);

    /// Run was cancelled (matches the conventional SIGINT code)
    pub const CANCELLED: ExitCode = ExitCode(130);

    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}

impl WaveforgeError {
    /// Map the error to the process exit code the CLI should return.
    #[must_use]
    pub fn to_exit_code(&self) -> ExitCode {
        match self {
            Self::Config(_) => ExitCode::CLI_ARGS,
            Self::Plan(_) => ExitCode::INVALID_PLAN,
            Self::Delegate(DelegateError::BudgetExceeded { .. }) => ExitCode::BUDGET_EXHAUSTED,
            Self::Delegate(DelegateError::Cancelled) => ExitCode::CANCELLED,
            Self::Json(_) => ExitCode::INVALID_PLAN,
            Self::Delegate(_) | Self::ArtifactStore(_) | Self::Io(_) => ExitCode::INTERNAL,
        }
    }
}
