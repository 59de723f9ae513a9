//! Error classification for engine connection failures.
//!
//! Converts low-level `Bollard` errors into semantic `ContainerError`
//! variants. Local sockets and tunnel forwarding sockets are both filesystem
//! paths, so a missing or unreadable socket is reported with its path.

use std::path::Path;

use crate::error::ContainerError;

/// Extract the filesystem path from a socket endpoint.
///
/// Accepts `unix://` URIs and bare absolute paths. HTTP endpoints have no
/// filesystem path and yield `None`.
pub(super) fn extract_socket_path(socket: &str) -> Option<&Path> {
    socket
        .strip_prefix("unix://")
        .or_else(|| socket.starts_with('/').then_some(socket))
        .map(Path::new)
}

/// Map an I/O error kind to a semantic error, using the socket path when one
/// is known.
fn classify_io_error_kind(
    kind: std::io::ErrorKind,
    socket_path: Option<&Path>,
    error_msg: &str,
) -> ContainerError {
    let fallback = || ContainerError::ConnectionFailed {
        message: error_msg.to_owned(),
    };
    match (kind, socket_path) {
        (std::io::ErrorKind::PermissionDenied, Some(path)) => ContainerError::PermissionDenied {
            path: path.to_path_buf(),
        },
        (std::io::ErrorKind::NotFound, Some(path)) => ContainerError::SocketNotFound {
            path: path.to_path_buf(),
        },
        _ => fallback(),
    }
}

/// Classify a `Bollard` error raised while talking to `socket`.
///
/// Falls back to `ConnectionFailed` for errors that do not match known
/// patterns or for endpoints without filesystem paths.
pub(super) fn classify_connection_error(
    bollard_error: &bollard::errors::Error,
    socket: &str,
) -> ContainerError {
    let socket_path = extract_socket_path(socket);
    let error_msg = bollard_error.to_string();

    match bollard_error {
        bollard::errors::Error::SocketNotFoundError(_) => {
            if let Some(path) = socket_path {
                return ContainerError::SocketNotFound {
                    path: path.to_path_buf(),
                };
            }
        }
        bollard::errors::Error::IOError { err } => {
            let kind = io_error_kind_in_chain(err).unwrap_or_else(|| err.kind());
            return classify_io_error_kind(kind, socket_path, &error_msg);
        }
        _ => {}
    }

    if let Some(kind) = io_error_kind_in_chain(bollard_error) {
        return classify_io_error_kind(kind, socket_path, &error_msg);
    }

    ContainerError::ConnectionFailed { message: error_msg }
}

/// Walk the error source chain looking for an `io::Error` kind.
fn io_error_kind_in_chain(error: &dyn std::error::Error) -> Option<std::io::ErrorKind> {
    let mut current: Option<&(dyn std::error::Error + 'static)> = error.source();
    while let Some(err) = current {
        if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
            return Some(io_err.kind());
        }
        current = err.source();
    }
    None
}
