//! The serializable error taxonomy returned by the payment core (§7).
//!
//! Mirrors the `error_kind!` macro pattern: a `Copy` enum with stable
//! numeric codes, generated `Display`/`ErrorCode` plumbing, and a single
//! [`ErrorResponse`] struct that is the only error type actually sent
//! across the wire.

use std::fmt;

use serde::{Deserialize, Serialize};

pub type ErrorCode = u16;

/// `ErrorResponse` is the wire representation of every error this service
/// returns: `{error_code, message, trace_id}` per §6.1.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error_code: ErrorCode,
    pub message: String,
    pub trace_id: String,
}

pub trait ToHttpStatus {
    fn to_http_status(&self) -> http::StatusCode;
}

/// Generates a `Copy + Display` error-kind enum with a stable numeric code
/// per variant and an `Unknown(ErrorCode)` catch-all for forward
/// compatibility with newer error kinds from a future deploy.
macro_rules! error_kind {
    {
        $(#[$enum_meta:meta])*
        pub enum $name:ident {
            $(#[doc = $unknown_msg:literal])*
            Unknown(ErrorCode),
            $(
                $(#[doc = $msg:literal])*
                $variant:ident = $code:literal
            ),* $(,)?
        }
    } => {
        $(#[$enum_meta])*
        pub enum $name {
            $(#[doc = $unknown_msg])*
            Unknown(ErrorCode),
            $( $(#[doc = $msg])* $variant, )*
        }

        impl $name {
            pub const KINDS: &'static [Self] = &[ $( Self::$variant, )* ];

            pub fn to_name(self) -> &'static str {
                match self {
                    $( Self::$variant => stringify!($variant), )*
                    Self::Unknown(_) => "Unknown",
                }
            }

            pub fn to_code(self) -> ErrorCode {
                match self {
                    $( Self::$variant => $code, )*
                    Self::Unknown(code) => code,
                }
            }

            pub fn from_code(code: ErrorCode) -> Self {
                match code {
                    $( $code => Self::$variant, )*
                    other => Self::Unknown(other),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "[{}={}]", self.to_code(), self.to_name())
            }
        }

        impl From<ErrorCode> for $name {
            fn from(code: ErrorCode) -> Self {
                Self::from_code(code)
            }
        }

        impl From<$name> for ErrorCode {
            fn from(kind: $name) -> ErrorCode {
                kind.to_code()
            }
        }
    };
}

error_kind! {
    /// Every error kind the payment core can surface, per §7's table.
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
    pub enum PaymentErrorKind {
        /// Unknown error
        Unknown(ErrorCode),

        /// Request failed input validation
        Validation = 1,
        /// The requested resource does not exist
        NotFound = 2,
        /// The sender's balance is insufficient for the requested transfer
        InsufficientBalance = 3,
        /// The sender's daily transfer limit would be exceeded
        DailyLimitExceeded = 4,
        /// The sender's monthly transfer limit would be exceeded
        MonthlyLimitExceeded = 5,
        /// The caller has exceeded the allowed request rate
        RateLimited = 6,
        /// The sender's account has been frozen by an operator
        AccountFrozen = 7,
        /// The supplied OTP code was invalid or expired
        InvalidOtp = 8,
        /// A terminal, non-retryable chain error occurred
        ChainError = 9,
        /// Envelope decryption or integrity check failed
        CryptoAuth = 10,
        /// An unclassified internal error occurred
        Internal = 11,
    }
}

impl ToHttpStatus for PaymentErrorKind {
    fn to_http_status(&self) -> http::StatusCode {
        use http::StatusCode as S;
        match self {
            Self::Validation => S::BAD_REQUEST,
            Self::NotFound => S::NOT_FOUND,
            Self::InsufficientBalance => S::BAD_REQUEST,
            Self::DailyLimitExceeded => S::BAD_REQUEST,
            Self::MonthlyLimitExceeded => S::BAD_REQUEST,
            Self::RateLimited => S::TOO_MANY_REQUESTS,
            Self::AccountFrozen => S::FORBIDDEN,
            Self::InvalidOtp => S::UNAUTHORIZED,
            // Terminal chain errors and crypto faults surface generically;
            // callers get a 503/500 and the detail stays in the logs.
            Self::ChainError => S::SERVICE_UNAVAILABLE,
            Self::CryptoAuth => S::INTERNAL_SERVER_ERROR,
            Self::Internal | Self::Unknown(_) => S::INTERNAL_SERVER_ERROR,
        }
    }
}

/// The top-level error type returned by the payment engine (C5) and
/// exposed across the HTTP/webhook boundary. Component-internal errors
/// (`KmsError`, `WalletError`, `ChainError`, `CacheError`) convert into
/// this at the boundary; anything unclassified becomes `Internal`.
#[derive(Clone, Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct PaymentError {
    pub kind: PaymentErrorKind,
    pub message: String,
}

impl PaymentError {
    pub fn new(kind: PaymentErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorKind::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorKind::NotFound, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorKind::Internal, message)
    }

    pub fn to_response(&self, trace_id: impl Into<String>) -> ErrorResponse {
        ErrorResponse {
            error_code: self.kind.to_code(),
            message: self.message.clone(),
            trace_id: trace_id.into(),
        }
    }
}

impl ToHttpStatus for PaymentError {
    fn to_http_status(&self) -> http::StatusCode {
        self.kind.to_http_status()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_every_known_code() {
        for kind in PaymentErrorKind::KINDS {
            let code = kind.to_code();
            assert_eq!(PaymentErrorKind::from_code(code), *kind);
        }
    }

    #[test]
    fn unknown_code_roundtrips_through_unknown_variant() {
        let weird = PaymentErrorKind::from_code(9999);
        assert_eq!(weird, PaymentErrorKind::Unknown(9999));
        assert_eq!(weird.to_code(), 9999);
    }

    #[test]
    fn http_status_matches_table() {
        assert_eq!(
            PaymentErrorKind::RateLimited.to_http_status(),
            http::StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            PaymentErrorKind::AccountFrozen.to_http_status(),
            http::StatusCode::FORBIDDEN
        );
        assert_eq!(
            PaymentErrorKind::CryptoAuth.to_http_status(),
            http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
