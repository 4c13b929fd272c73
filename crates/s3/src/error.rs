//! Translation of AWS SDK failures into the depot error kinds
//!
//! The retrier never sees backend-specific errors; everything is mapped
//! here before it leaves the adapter.

use aws_sdk_s3::error::SdkError;
use aws_smithy_runtime_api::client::orchestrator::HttpResponse;
use aws_smithy_runtime_api::http::StatusCode;
use aws_smithy_types::error::display::DisplayErrorContext;

use depot_core::Error;

pub(crate) const BACKEND: &str = "S3";

/// 5xx-class responses and request timeouts are worth another attempt;
/// the whole 4xx range (throttling included) is rejected permanently.
pub(crate) fn retryable_status(status: StatusCode) -> bool {
    let code = status.as_u16();
    code >= 500 || code == 408
}

/// Maps an SDK failure onto the transient/permanent split, keeping the
/// full error chain in the message.
pub(crate) fn transfer_error<E>(context: impl Into<String>, err: &SdkError<E, HttpResponse>) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    let message = format!("{}: {}", context.into(), DisplayErrorContext(err));
    match err {
        SdkError::ServiceError(service) if !retryable_status(service.raw().status()) => {
            Error::permanent(BACKEND, message)
        }
        SdkError::ConstructionFailure(_) => Error::permanent(BACKEND, message),
        _ => Error::transient(BACKEND, message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::operation::get_object::GetObjectError;

    #[test]
    fn test_retryable_status_split() {
        assert!(retryable_status(StatusCode::try_from(500).unwrap()));
        assert!(retryable_status(StatusCode::try_from(503).unwrap()));
        assert!(retryable_status(StatusCode::try_from(408).unwrap()));

        assert!(!retryable_status(StatusCode::try_from(400).unwrap()));
        assert!(!retryable_status(StatusCode::try_from(403).unwrap()));
        assert!(!retryable_status(StatusCode::try_from(429).unwrap()));
    }

    #[test]
    fn test_timeout_is_transient() {
        let err: SdkError<GetObjectError, HttpResponse> =
            SdkError::timeout_error(Box::new(std::io::Error::other("deadline elapsed")));
        let mapped = transfer_error("unable to open 'base/object'", &err);

        assert!(mapped.is_retryable());
        assert!(mapped.to_string().contains("base/object"));
    }
}
