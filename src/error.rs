//! Error kinds surfaced by the question-answering core.
//!
//! Component-local failures (one corrupt file in a batch) are absorbed and
//! logged at the call site; these typed kinds exist for the cases callers
//! need to distinguish. They travel inside `anyhow::Error` and can be
//! recovered by downcast.

/// Typed failure reported by the pipeline.
#[derive(Debug)]
pub enum Error {
    /// A source file could not be read or parsed as a PDF.
    Load(String),
    /// An upload was rejected before entering the pipeline.
    Validation(String),
    /// A retriever was requested before the index holds any entries.
    NotReady,
    /// A question was asked before a retriever was bound.
    NotBound,
    /// Filesystem or vector backend I/O failure.
    Storage(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Load(e) => write!(f, "failed to load document: {}", e),
            Error::Validation(e) => write!(f, "invalid upload: {}", e),
            Error::NotReady => write!(f, "no indexed documents available"),
            Error::NotBound => write!(f, "conversation has no bound retriever"),
            Error::Storage(e) => write!(f, "storage failure: {}", e),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_kind() {
        assert!(Error::Load("bad xref".into()).to_string().contains("bad xref"));
        assert!(Error::NotReady.to_string().contains("no indexed documents"));
    }

    #[test]
    fn survives_anyhow_downcast() {
        let err: anyhow::Error = Error::NotBound.into();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::NotBound)));
    }
}
