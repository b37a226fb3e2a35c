//! Conversions from external infrastructure errors into domain errors.

use jsonwebtoken::errors::Error as JwtError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;
use tracklane_domain::TracklaneError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub TracklaneError);

impl From<InfraError> for TracklaneError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<TracklaneError> for InfraError {
    fn from(value: TracklaneError) -> Self {
        InfraError(value)
    }
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → TracklaneError */
/* -------------------------------------------------------------------------- */

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        let domain = match value {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match err.code {
                    ErrorCode::DatabaseBusy => TracklaneError::Database("database is busy".into()),
                    ErrorCode::DatabaseLocked => {
                        TracklaneError::Database("database is locked".into())
                    }
                    ErrorCode::ConstraintViolation => TracklaneError::Database(format!(
                        "constraint violation (code {}): {message}",
                        err.extended_code
                    )),
                    _ => TracklaneError::Database(format!(
                        "sqlite failure {:?} (code {}): {message}",
                        err.code, err.extended_code
                    )),
                }
            }
            RE::QueryReturnedNoRows => {
                TracklaneError::NotFound("no rows returned by query".into())
            }
            RE::FromSqlConversionFailure(_, _, cause) => {
                TracklaneError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                TracklaneError::Database(format!("invalid column type: {ty}"))
            }
            RE::InvalidQuery => TracklaneError::Database("invalid SQL query".into()),
            other => TracklaneError::Database(other.to_string()),
        };

        InfraError(domain)
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → TracklaneError */
/* -------------------------------------------------------------------------- */

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(TracklaneError::Database(format!("connection pool error: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → TracklaneError */
/* -------------------------------------------------------------------------- */

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        let domain = if value.is_timeout() {
            TracklaneError::Network(format!("http request timed out: {value}"))
        } else if value.is_connect() {
            TracklaneError::Network(format!("http connection failed: {value}"))
        } else if value.is_decode() {
            TracklaneError::Internal(format!("failed to decode http response: {value}"))
        } else {
            TracklaneError::Network(format!("http error: {value}"))
        };

        InfraError(domain)
    }
}

/* -------------------------------------------------------------------------- */
/* jsonwebtoken::errors::Error → TracklaneError */
/* -------------------------------------------------------------------------- */

impl From<JwtError> for InfraError {
    fn from(value: JwtError) -> Self {
        InfraError(TracklaneError::Auth(format!("token signing failed: {value}")))
    }
}
