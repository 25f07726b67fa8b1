use thiserror::Error;

/// Failures of the metastore client, the benchmark configuration and report I/O.
#[derive(Debug, Error)]
pub enum MetabenchError {
    #[error("cannot open metastore: {0}")]
    Connection(String),
    #[error("metastore schema mismatch: {0}")]
    Schema(String),
    #[error("metastore call failed: {0}")]
    Query(String),
    #[error("{0} does not exist")]
    NotFound(String),
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("invalid argument: {0}")]
    InvalidInput(String),
    #[error("report i/o: {0}")]
    Io(#[from] std::io::Error),
}

impl MetabenchError {
    pub fn connection<T: Into<String>>(msg: T) -> Self {
        MetabenchError::Connection(msg.into())
    }

    pub fn schema<T: Into<String>>(msg: T) -> Self {
        MetabenchError::Schema(msg.into())
    }

    pub fn query<T: Into<String>>(msg: T) -> Self {
        MetabenchError::Query(msg.into())
    }

    /// `what` names the missing object, e.g. `table db.t`.
    pub fn not_found<T: Into<String>>(what: T) -> Self {
        MetabenchError::NotFound(what.into())
    }

    pub fn already_exists<T: Into<String>>(what: T) -> Self {
        MetabenchError::AlreadyExists(what.into())
    }

    pub fn invalid_input<T: Into<String>>(msg: T) -> Self {
        MetabenchError::InvalidInput(msg.into())
    }
}
