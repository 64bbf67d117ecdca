use thiserror::Error;

pub type Result<T> = std::result::Result<T, GoError>;

#[derive(Error, Debug)]
pub enum GoError {
    #[error("duplicate term: {0}")]
    DuplicateTerm(String),

    #[error("unknown term: {0}")]
    UnknownTerm(String),

    /// Names the lexicographically smallest id among the terms on a cycle.
    #[error("cycle detected in ontology at term {0}")]
    CycleDetected(String),

    #[error("gene {gene} is annotated with unknown term {term}")]
    Propagation { gene: String, term: String },

    #[error("invalid namespace: {0}")]
    InvalidNamespace(String),

    #[error("invalid relation kind: {0}")]
    InvalidRelation(String),

    #[error("malformed ontology at line {line}: {message}")]
    Obo { line: usize, message: String },

    #[error("malformed annotation at line {line}: {message}")]
    Gaf { line: u64, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
