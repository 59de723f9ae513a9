//! Naming and on-disk layout of workspaces and projects.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;

use crate::error::TargetError;
use crate::provider::request::{BuildConfig, Project};
use crate::target::TargetMode;

/// Devcontainer definitions looked for in a project's working tree.
const DEVCONTAINER_FILES: [&str; 2] = [".devcontainer/devcontainer.json", ".devcontainer.json"];

/// Mount point of a project's working tree inside its container.
#[must_use]
pub fn container_workdir(project: &str) -> String {
    format!("/workspaces/{project}")
}

/// Return the directory that holds every project of `workspace_id`.
///
/// Local targets use `base_path`; remote targets use the target's
/// `Workspace Data Dir`.
///
/// # Errors
///
/// Returns `TargetError::MalformedOptions` for a remote target without a
/// data directory.
pub fn workspace_dir(
    mode: &TargetMode,
    base_path: &Utf8Path,
    workspace_id: &str,
) -> Result<Utf8PathBuf, TargetError> {
    let root = match mode {
        TargetMode::Local { .. } => base_path,
        TargetMode::Remote(remote) => remote.workspace_data_dir()?,
    };
    Ok(root.join(workspace_id))
}

/// Return the working tree of `project`, `<workspace dir>/<ws>-<project>`.
///
/// # Errors
///
/// As for [`workspace_dir`].
pub fn project_dir(
    mode: &TargetMode,
    base_path: &Utf8Path,
    project: &Project,
) -> Result<Utf8PathBuf, TargetError> {
    Ok(workspace_dir(mode, base_path, &project.workspace_id)?.join(project.container_name()))
}

/// Whether the project builds from a devcontainer.
///
/// An explicit devcontainer build wins. Otherwise a local working tree is
/// searched for a devcontainer definition; unreadable trees count as plain.
#[must_use]
pub fn is_devcontainer(build: Option<&BuildConfig>, local_dir: Option<&Utf8Path>) -> bool {
    if build.is_some_and(|config| config.devcontainer.is_some()) {
        return true;
    }

    let Some(dir) = local_dir else {
        return false;
    };
    let Ok(tree) = Dir::open_ambient_dir(dir, ambient_authority()) else {
        return false;
    };
    DEVCONTAINER_FILES
        .iter()
        .any(|candidate| tree.is_file(candidate))
}
