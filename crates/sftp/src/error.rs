//! Translation of libssh2 failures into the depot error kinds

use ssh2::ErrorCode;

use depot_core::Error;

pub(crate) const BACKEND: &str = "SSH";

// SFTP status codes from the protocol, surfaced by libssh2.
const FX_NO_SUCH_FILE: i32 = 2;
const FX_NO_SUCH_PATH: i32 = 10;

pub(crate) fn is_not_found(err: &ssh2::Error) -> bool {
    matches!(
        err.code(),
        ErrorCode::SFTP(FX_NO_SUCH_FILE) | ErrorCode::SFTP(FX_NO_SUCH_PATH)
    )
}

/// Authentication happens at connect time, outside this crate, so the
/// failures seen here are transport problems worth another attempt.
pub(crate) fn translate(context: impl Into<String>, err: ssh2::Error) -> Error {
    Error::transient(BACKEND, format!("{}: {err}", context.into()))
}

pub(crate) fn join_error(err: tokio::task::JoinError) -> Error {
    Error::permanent(BACKEND, format!("worker task failed: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_and_path_are_not_found() {
        let file = ssh2::Error::new(ErrorCode::SFTP(FX_NO_SUCH_FILE), "no such file");
        let path = ssh2::Error::new(ErrorCode::SFTP(FX_NO_SUCH_PATH), "no such path");
        assert!(is_not_found(&file));
        assert!(is_not_found(&path));
    }

    #[test]
    fn test_other_failures_are_transient() {
        let err = ssh2::Error::new(ErrorCode::Session(-7), "unable to send data");
        assert!(!is_not_found(&err));
        assert!(translate("unable to list '/backups'", err).is_retryable());
    }
}
