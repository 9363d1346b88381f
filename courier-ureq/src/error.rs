use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("worker pool needs at least one thread")]
    EmptyPool,
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[cfg(feature = "rayon")]
    #[error(transparent)]
    Rayon(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for courier_core::Error {
    fn from(e: Error) -> Self {
        courier_core::Error::Backend(Box::new(e))
    }
}
