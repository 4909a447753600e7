use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("profile already registered: {0}")]
    AlreadyExists(String),

    #[error("invalid profile name: {0:?}")]
    InvalidName(String),
}
