// Error taxonomy for a chaptering run
//
// Every failure is fatal to the whole run: a scan either produces the full
// chapter list or nothing.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    /// Media reference missing, unreadable or without a video track
    #[error("failed to open {path}")]
    Open {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    /// Frame retrieval failed (end of stream, corrupt data, failed seek)
    #[error("failed to decode frame {position}")]
    Decode {
        position: usize,
        #[source]
        source: anyhow::Error,
    },

    /// The text recognizer could not be run on a frame
    #[error("text recognition failed at frame {position}")]
    Recognition {
        position: usize,
        #[source]
        source: anyhow::Error,
    },

    /// Writing the chaptered output failed
    #[error("failed to export chapters to {path}")]
    Export {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("scan cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ScanError {
    pub fn open(path: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Open {
            path: path.into(),
            source,
        }
    }

    pub fn decode(position: usize, source: anyhow::Error) -> Self {
        Self::Decode { position, source }
    }

    pub fn recognition(position: usize, source: anyhow::Error) -> Self {
        Self::Recognition { position, source }
    }

    pub fn export(path: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Export {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_decode_error_keeps_cause() {
        let err = ScanError::decode(42, anyhow::anyhow!("End of stream"));
        assert_eq!(err.to_string(), "failed to decode frame 42");
        let cause = err.source().map(|s| s.to_string());
        assert_eq!(cause.as_deref(), Some("End of stream"));
    }
}
