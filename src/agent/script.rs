//! The shell command that installs and launches the in-container agent.

use crate::engine::BootstrapExec;
use crate::error::BerthError;

/// Quote `value` for a POSIX shell.
pub(crate) fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Build the install-and-run script for the agent.
///
/// The script downloads the installer from `download_url`, authenticating
/// with `api_key`, runs it with the caller's environment and then starts the
/// agent in the foreground.
#[must_use]
pub fn project_start_script(download_url: &str, api_key: &str) -> String {
    let header = shell_quote(&format!("Authorization: Bearer {api_key}"));
    let url = shell_quote(download_url);
    format!("curl -sfL -H {header} {url} | sudo -E bash && daytona agent")
}

/// Build the exec request running the start script in `container` as `user`.
///
/// # Errors
///
/// Returns `ConfigError::MissingRequired` when `container` is blank.
pub fn bootstrap_exec(
    container: &str,
    user: Option<String>,
    download_url: &str,
    api_key: &str,
) -> Result<BootstrapExec, BerthError> {
    let command = vec![
        String::from("bash"),
        String::from("-c"),
        project_start_script(download_url, api_key),
    ];
    Ok(BootstrapExec::new(container, command)?.with_user(user))
}
