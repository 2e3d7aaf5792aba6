// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for cp-mgmt-sdk.
//!
//! Only faults are errors. A server that answers with a non-2xx status, or a
//! task that ends up `failed`, is reported through [`crate::ApiResponse`] with
//! `success == false`.

use thiserror::Error;

/// Result type using SdkError.
pub type Result<T> = std::result::Result<T, SdkError>;

/// Errors that can occur when using the management SDK.
#[derive(Debug, Error)]
pub enum SdkError {
    /// Configuration error (missing or invalid values).
    #[error("configuration error: {0}")]
    Config(String),

    /// DNS, connect, timeout or I/O failure while talking to the server.
    #[error("transport error: {0}")]
    Transport(String),

    /// TLS setup or handshake failure, including a pinned fingerprint mismatch.
    #[error("tls error: {0}")]
    Tls(String),

    /// The server certificate was not accepted; no request was sent.
    #[error("fingerprint of {server} is not trusted, someone might be trying to steal your information")]
    UntrustedCertificate { server: String },

    /// HTTP method outside of GET, POST, PUT and DELETE.
    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// Unexpected response from server.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The local fingerprint file could not be read or written.
    #[error("trust store error: {0}")]
    TrustStore(String),
}

impl From<serde_json::Error> for SdkError {
    fn from(err: serde_json::Error) -> Self {
        SdkError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for SdkError {
    fn from(err: std::io::Error) -> Self {
        SdkError::Transport(err.to_string())
    }
}

impl From<rustls::Error> for SdkError {
    fn from(err: rustls::Error) -> Self {
        SdkError::Tls(err.to_string())
    }
}

impl From<ureq::Error> for SdkError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(code, _) => {
                SdkError::UnexpectedResponse(format!("unhandled HTTP status {}", code))
            }
            ureq::Error::Transport(transport) => SdkError::Transport(transport.to_string()),
        }
    }
}
