pub mod docker;
pub mod listener;
pub mod observe;
pub mod reconciler;
pub mod source;

pub use source::RuntimeSource;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Docker API error: {0}")]
    DockerApi(#[from] bollard::errors::Error),
}
