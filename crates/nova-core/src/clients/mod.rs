//! Production implementations of the capability interfaces in
//! [`crate::services`].

pub mod galaxy_csv;

#[cfg(feature = "runtime")]
pub mod ads;
#[cfg(feature = "runtime")]
pub mod simbad;

pub use galaxy_csv::CsvGalaxyCatalog;

#[cfg(feature = "runtime")]
pub use ads::AdsArchive;
#[cfg(feature = "runtime")]
pub use simbad::SimbadTapResolver;

#[cfg(feature = "runtime")]
pub(crate) fn classify_reqwest(context: &str, err: reqwest::Error) -> crate::services::ServiceError {
    use crate::services::ServiceError;

    if err.is_timeout() || err.is_connect() {
        return ServiceError::Transient(format!("{context}: {err}"));
    }
    if let Some(status) = err.status() {
        if status.is_server_error() || status.as_u16() == 429 {
            return ServiceError::Transient(format!("{context}: http {status}"));
        }
        return ServiceError::Protocol(format!("{context}: http {status}"));
    }
    if err.is_decode() {
        return ServiceError::Protocol(format!("{context}: {err}"));
    }
    // Request never completed (DNS, TLS, connection reset mid-flight).
    ServiceError::Transient(format!("{context}: {err}"))
}
