use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("{path}: failed to read image ({source})")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("pixel buffer holds {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("image has no frames")]
    Empty,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{path}: failed to read config ({source})")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: invalid config ({source})")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("invalid stack document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("structure {id} is a {expected} but slice {slice} holds a {found}")]
    KindMismatch {
        id: u64,
        slice: usize,
        expected: &'static str,
        found: &'static str,
    },

    #[error("annotation {id} on slice {slice} is a {expected} but holds a {found}")]
    LegacyKindMismatch {
        id: u64,
        slice: usize,
        expected: &'static str,
        found: &'static str,
    },
}
