use yocto_types::ApiCode;

pub type Result<T> = std::result::Result<T, YoctoError>;

#[derive(thiserror::Error, Debug)]
pub enum YoctoError {
    #[error("No hub has been registered")]
    NotInitialized,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Access denied by hub: {0}")]
    Unauthorized(String),

    #[error("File not found on device: {0}")]
    FileNotFound(String),

    #[error("Attribute {0} not reported by device")]
    MissingAttribute(String),

    #[error("Unexpected value {value} for attribute {attribute}")]
    UnexpectedValue { attribute: String, value: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed response from hub: {0}")]
    MalformedResponse(#[from] serde_json::Error),
}

impl YoctoError {
    /// The status code other Yoctopuce libraries would report for this failure.
    pub fn code(&self) -> ApiCode {
        match self {
            YoctoError::NotInitialized => ApiCode::NotInitialized,
            YoctoError::InvalidArgument(_) => ApiCode::InvalidArgument,
            YoctoError::NotSupported(_) => ApiCode::NotSupported,
            YoctoError::DeviceNotFound(_) => ApiCode::DeviceNotFound,
            YoctoError::Timeout(_) => ApiCode::Timeout,
            YoctoError::Unauthorized(_) => ApiCode::Unauthorized,
            YoctoError::FileNotFound(_) => ApiCode::FileNotFound,
            YoctoError::Http(e) if e.is_timeout() => ApiCode::Timeout,
            YoctoError::IoError(_)
            | YoctoError::MissingAttribute(_)
            | YoctoError::UnexpectedValue { .. }
            | YoctoError::Http(_)
            | YoctoError::MalformedResponse(_) => ApiCode::IoError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_yapi_numbering() {
        assert_eq!(YoctoError::NotInitialized.code().code(), -1);
        assert_eq!(YoctoError::InvalidArgument("x".into()).code().code(), -2);
        assert_eq!(YoctoError::DeviceNotFound("x".into()).code().code(), -4);
        assert_eq!(YoctoError::MissingAttribute("unit".into()).code(), ApiCode::IoError);
    }

    #[test]
    fn json_failures_are_io_errors() {
        let error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(YoctoError::from(error).code(), ApiCode::IoError);
    }
}
