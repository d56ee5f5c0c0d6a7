use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use crate::transport::TransportError;

/// Result type alias for OPC DA operations.
pub type OpcResult<T> = Result<T, OpcError>;

/// Well-known status codes returned by OPC DA servers and the COM runtime.
pub mod codes {
    pub const S_OK: u32 = 0x0000_0000;
    pub const S_FALSE: u32 = 0x0000_0001;

    pub const E_NOTIMPL: u32 = 0x8000_4001;
    pub const E_NOINTERFACE: u32 = 0x8000_4002;
    pub const E_POINTER: u32 = 0x8000_4003;
    pub const E_FAIL: u32 = 0x8000_4005;
    pub const E_UNEXPECTED: u32 = 0x8000_FFFF;
    pub const E_ACCESSDENIED: u32 = 0x8007_0005;
    pub const E_OUTOFMEMORY: u32 = 0x8007_000E;
    pub const E_INVALIDARG: u32 = 0x8007_0057;

    pub const OPC_E_INVALIDHANDLE: u32 = 0xC004_0001;
    pub const OPC_E_BADTYPE: u32 = 0xC004_0004;
    pub const OPC_E_PUBLIC: u32 = 0xC004_0005;
    pub const OPC_E_BADRIGHTS: u32 = 0xC004_0006;
    pub const OPC_E_UNKNOWNITEMID: u32 = 0xC004_0007;
    pub const OPC_E_INVALIDITEMID: u32 = 0xC004_0008;
    pub const OPC_E_INVALIDFILTER: u32 = 0xC004_0009;
    pub const OPC_E_UNKNOWNPATH: u32 = 0xC004_000A;
    pub const OPC_E_RANGE: u32 = 0xC004_000B;
    pub const OPC_E_DUPLICATENAME: u32 = 0xC004_000C;
    pub const OPC_S_UNSUPPORTEDRATE: u32 = 0x0004_000D;
    pub const OPC_S_CLAMP: u32 = 0x0004_000E;
    pub const OPC_S_INUSE: u32 = 0x0004_000F;
    pub const OPC_E_INVALIDCONFIG: u32 = 0xC004_0010;
    pub const OPC_E_NOTFOUND: u32 = 0xC004_0011;
    pub const OPC_E_INVALID_PID: u32 = 0xC004_0203;
}

/// Centralized error enum for the OPC DA proxies.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OpcError {
    /// The transport failed before a status could be read from the server.
    #[error("Transport error: {0}")]
    Transport(#[source] anyhow::Error),

    /// The server answered a call with a failure status.
    #[error("Remote call failed: {}", format_status(*.code))]
    Remote { code: u32 },

    /// The remote object does not expose the requested interface.
    #[error("Interface {iid} is not supported by the remote object")]
    NoSuchInterface { iid: Uuid },

    /// A proxy was used before `init` or after `end`.
    #[error("Not initialized: {0}")]
    NotInitialized(&'static str),

    /// `init` was called on a proxy that already holds a reference.
    #[error("Already initialized: {0}")]
    AlreadyInitialized(&'static str),

    /// Arguments were rejected locally; no remote call was made.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A response could not be unmarshalled.
    #[error("Malformed response: {0}")]
    Decode(String),

    /// Errors during data type conversion or VARIANT processing.
    #[error("Data conversion failed: {0}")]
    Conversion(String),

    /// Catch-all for unexpected internal failures.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OpcError {
    /// Returns the numeric status carried by a [`OpcError::Remote`] error.
    pub fn code(&self) -> Option<u32> {
        match self {
            Self::Remote { code } => Some(*code),
            Self::NoSuchInterface { .. } => Some(codes::E_NOINTERFACE),
            _ => None,
        }
    }

    /// True when this error is a remote failure with the given status.
    pub fn is_code(&self, code: u32) -> bool {
        self.code() == Some(code)
    }
}

impl From<TransportError> for OpcError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::NoSuchInterface(iid) => Self::NoSuchInterface { iid },
            TransportError::Other(source) => Self::Transport(source),
        }
    }
}

impl From<anyhow::Error> for OpcError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<std::num::TryFromIntError> for OpcError {
    fn from(err: std::num::TryFromIntError) -> Self {
        OpcError::Conversion(format!("Integer conversion error: {err}"))
    }
}

/// 32-bit status word returned by every remote call and per item.
///
/// Bit 31 marks a failure. Any other nonzero value is a success code that
/// carries extra information (`S_FALSE`, `OPC_S_CLAMP`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Status(pub u32);

impl Status {
    pub const OK: Self = Self(codes::S_OK);
    pub const FALSE: Self = Self(codes::S_FALSE);

    pub const fn code(self) -> u32 {
        self.0
    }

    pub const fn is_ok(self) -> bool {
        self.0 == codes::S_OK
    }

    pub const fn is_failure(self) -> bool {
        self.0 & 0x8000_0000 != 0
    }

    /// Nonzero, but not a failure.
    pub const fn is_soft(self) -> bool {
        !self.is_ok() && !self.is_failure()
    }

    /// Converts a failure status into [`OpcError::Remote`].
    pub fn into_result(self) -> OpcResult<Self> {
        if self.is_failure() {
            Err(OpcError::Remote { code: self.0 })
        } else {
            Ok(self)
        }
    }
}

impl From<u32> for Status {
    fn from(code: u32) -> Self {
        Self(code)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_status(self.0))
    }
}

/// Helper to format a status code with its description and hint.
pub fn format_status(code: u32) -> String {
    let hex = format!("0x{code:08X}");
    match (describe_status(code), friendly_status_hint(code)) {
        (Some(desc), Some(hint)) => format!("{hex} ({desc}): {hint}"),
        (Some(desc), None) => format!("{hex} ({desc})"),
        (None, Some(hint)) => format!("{hex}: {hint}"),
        (None, None) => hex,
    }
}

/// English description of the OPC-specific status codes.
pub fn describe_status(code: u32) -> Option<&'static str> {
    use codes::*;

    match code {
        OPC_E_INVALIDHANDLE => Some("The value of the handle is invalid"),
        OPC_E_BADTYPE => {
            Some("The server cannot convert the data between the specified format and the requested data type")
        }
        OPC_E_PUBLIC => Some("The requested operation cannot be done on a public group"),
        OPC_E_BADRIGHTS => Some("The item's access rights do not allow the operation"),
        OPC_E_UNKNOWNITEMID => Some("The item ID is not defined in the server address space"),
        OPC_E_INVALIDITEMID => Some("The item ID does not conform to the server's syntax"),
        OPC_E_INVALIDFILTER => Some("The filter string was not valid"),
        OPC_E_UNKNOWNPATH => Some("The item's access path is not known to the server"),
        OPC_E_RANGE => Some("The value was out of range"),
        OPC_E_DUPLICATENAME => Some("Duplicate name not allowed"),
        OPC_S_UNSUPPORTEDRATE => {
            Some("The server does not support the requested data rate but will use the closest available rate")
        }
        OPC_S_CLAMP => Some("A value passed to write was accepted but the output was clamped"),
        OPC_S_INUSE => {
            Some("The operation cannot be performed because the object is being referenced")
        }
        OPC_E_INVALIDCONFIG => Some("The server's configuration file is an invalid format"),
        OPC_E_NOTFOUND => Some("The requested object was not found"),
        OPC_E_INVALID_PID => Some("The specified property ID is not valid for the item"),
        S_FALSE => Some("S_FALSE"),
        E_NOTIMPL => Some("E_NOTIMPL"),
        E_NOINTERFACE => Some("E_NOINTERFACE"),
        E_FAIL => Some("E_FAIL"),
        E_INVALIDARG => Some("E_INVALIDARG"),
        E_OUTOFMEMORY => Some("E_OUTOFMEMORY"),
        _ => None,
    }
}

/// Maps known COM/DCOM error codes to actionable user hints.
pub fn friendly_status_hint(code: u32) -> Option<&'static str> {
    match code {
        0x80040112 => Some("Server license does not permit OPC client connections"),
        0x80080005 => Some("Server process failed to start, check if it is installed and running"),
        0x80070005 => {
            Some("Access denied, DCOM launch/activation permissions not configured for this user")
        }
        0x800706BA => {
            Some("RPC server unavailable, the target host may be offline or blocking RPC")
        }
        0x800706F4 => Some("COM marshalling error, try restarting the OPC server"),
        0x80040154 => Some("Server is not registered on this machine"),
        0x80004003 => Some("Invalid pointer (E_POINTER)"),
        0xC0040004 => {
            Some("Data type mismatch, server cannot convert the written value (OPC_E_BADTYPE)")
        }
        0xC0040006 => Some("Server rejected write, the item may be read-only (OPC_E_BADRIGHTS)"),
        0xC0040007 => Some("Item ID not found in server address space (OPC_E_UNKNOWNITEMID)"),
        0xC0040008 => Some("Item ID syntax is invalid for this server (OPC_E_INVALIDITEMID)"),
        _ => None,
    }
}

/// Maps an [`OpcError`] to a friendly hint if it carries a remote status.
pub fn friendly_error_hint(error: &OpcError) -> Option<&'static str> {
    error.code().and_then(friendly_status_hint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_severity() {
        assert!(Status::OK.is_ok());
        assert!(!Status::OK.is_soft());
        assert!(Status::FALSE.is_soft());
        assert!(Status(codes::OPC_S_CLAMP).is_soft());
        assert!(Status(codes::E_FAIL).is_failure());
        assert!(Status(codes::OPC_E_BADTYPE).is_failure());
        assert!(!Status(codes::OPC_S_INUSE).is_failure());
    }

    #[test]
    fn test_into_result_only_fails_on_failure_bit() {
        assert_eq!(Status::FALSE.into_result().unwrap(), Status::FALSE);
        let err = Status(codes::OPC_E_UNKNOWNITEMID).into_result().unwrap_err();
        assert_eq!(err.code(), Some(codes::OPC_E_UNKNOWNITEMID));
    }

    #[test]
    fn test_format_status_known_code() {
        let text = format_status(codes::OPC_E_UNKNOWNITEMID);
        assert!(text.starts_with("0xC0040007 (The item ID is not defined"));
        assert!(text.contains("OPC_E_UNKNOWNITEMID"));
    }

    #[test]
    fn test_format_status_unknown_code() {
        assert_eq!(format_status(0x1234_5678), "0x12345678");
    }

    #[test]
    fn test_transport_error_conversion() {
        let iid = Uuid::from_u128(0x1234);
        let err: OpcError = TransportError::NoSuchInterface(iid).into();
        assert!(matches!(err, OpcError::NoSuchInterface { iid: got } if got == iid));
        assert!(err.is_code(codes::E_NOINTERFACE));

        let err: OpcError = TransportError::Other(anyhow::anyhow!("socket closed")).into();
        assert!(err.to_string().contains("socket closed"));
        assert_eq!(err.code(), None);
    }

    #[test]
    fn test_friendly_error_hint() {
        let err = OpcError::Remote {
            code: codes::OPC_E_BADRIGHTS,
        };
        assert!(friendly_error_hint(&err).unwrap().contains("read-only"));
        assert!(friendly_error_hint(&OpcError::Internal("x".into())).is_none());
    }
}
