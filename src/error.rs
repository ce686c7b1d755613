#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Malformed or out-of-range setup value. Raised during stage
    /// construction; the stage is not usable afterwards.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A required collaborator or output was missing when setup finished
    /// or when data arrived.
    #[error("unresolved link: {0}")]
    Linkage(String),

    /// Attempt to wire a node that lacks the receiving capability.
    #[error("{0} is not a receiver of the declared type")]
    NotAReceiver(String),

    #[error("config parse: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
