//! Process exit codes
//!
//! Scripts driving `wagon` can tell failure kinds apart by exit status.

/// Exit status of a `wagon` invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,
    /// Bad arguments, descriptor or configuration
    UsageError = 2,
    TransferError = 3,
    AuthError = 4,
    NotFound = 5,
    UnsupportedFeature = 6,
}

impl ExitCode {
    pub fn from_error(error: &wagon_core::Error) -> Self {
        use wagon_core::Error;

        match error {
            Error::Config(_) => ExitCode::UsageError,
            Error::Transfer { .. } => ExitCode::TransferError,
            Error::Auth { .. } => ExitCode::AuthError,
            Error::NotFound(_) => ExitCode::NotFound,
            Error::Unsupported(_) => ExitCode::UnsupportedFeature,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.as_u8())
    }
}
