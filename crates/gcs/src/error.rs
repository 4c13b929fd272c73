//! Translation of `object_store` failures into the depot error kinds

use depot_core::Error;

pub(crate) const BACKEND: &str = "GCS";

/// Maps a store failure onto the depot kinds. Not-found keeps the remote
/// path so callers can branch on it; permission and precondition problems
/// are permanent; everything else (network, 5xx, throttling surfaced as
/// generic errors) is worth another attempt.
pub(crate) fn translate(context: impl Into<String>, err: object_store::Error) -> Error {
    use object_store::Error as StoreError;

    match err {
        StoreError::NotFound { path, .. } => Error::not_found(path),
        StoreError::InvalidPath { .. }
        | StoreError::NotSupported { .. }
        | StoreError::AlreadyExists { .. }
        | StoreError::Precondition { .. }
        | StoreError::NotModified { .. }
        | StoreError::PermissionDenied { .. }
        | StoreError::Unauthenticated { .. }
        | StoreError::UnknownConfigurationKey { .. }
        | StoreError::NotImplemented => {
            Error::permanent(BACKEND, format!("{}: {err}", context.into()))
        }
        other => Error::transient(BACKEND, format!("{}: {other}", context.into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_distinguished() {
        let err = object_store::Error::NotFound {
            path: "base/object".into(),
            source: "missing".into(),
        };
        assert!(translate("unable to open", err).is_not_found());
    }

    #[test]
    fn test_generic_failures_are_transient() {
        let err = object_store::Error::Generic {
            store: "GCS",
            source: "connection reset by peer".into(),
        };
        assert!(translate("unable to list", err).is_retryable());
    }

    #[test]
    fn test_permission_failures_are_permanent() {
        let err = object_store::Error::PermissionDenied {
            path: "base/object".into(),
            source: "forbidden".into(),
        };
        let mapped = translate("unable to read", err);
        assert!(!mapped.is_retryable());
        assert!(!mapped.is_not_found());
    }
}
