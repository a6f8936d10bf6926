//! Docker client setup using bollard.

use bollard::Docker;
use bollard::models::ContainerInspectResponse;
use bollard::query_parameters::{InspectContainerOptions, InspectContainerOptionsBuilder};

use super::RuntimeError;

/// Connects using the default method (Unix socket on Linux/macOS, named
/// pipe on Windows). The client is owned by the caller and cloned into
/// every source that needs it.
pub fn connect() -> Result<Docker, RuntimeError> {
    Ok(Docker::connect_with_local_defaults()?)
}

/// Inspects a container. `Ok(None)` when the runtime no longer knows it.
pub async fn inspect(docker: &Docker, id: &str) -> Result<Option<ContainerInspectResponse>, RuntimeError> {
    let options: InspectContainerOptions = InspectContainerOptionsBuilder::new().build();
    match docker.inspect_container(id, Some(options)).await {
        Ok(info) => Ok(Some(info)),
        Err(bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        }) => Ok(None),
        Err(e) => Err(RuntimeError::DockerApi(e)),
    }
}
