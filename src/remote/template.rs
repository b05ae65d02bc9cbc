//! URL templates.
//!
//! Tokens are substituted by plain string replacement; values are not
//! URL-encoded.

use crate::config::RemoteConfig;

pub const SERVER_URL_PREFIX: &str = "${server.url.prefix}";
pub const LOCAL_SERVER_NAME: &str = "${local.server.name}";
pub const CONFIG_KEY_PREFIX: &str = "${config.key.prefix}";
pub const CONFIG_FILE_EXTENSION: &str = "${config.file.extension}";
pub const EXTRA_FILE_PATH: &str = "${extra.file.path}";

fn substitute(remote: &RemoteConfig, pattern: &str, tokens: &[(&str, &str)]) -> Option<String> {
    let prefix = remote.server_url_prefix.as_deref()?;
    let mut url = pattern
        .replace(SERVER_URL_PREFIX, prefix)
        .replace(LOCAL_SERVER_NAME, &remote.local_server_name);
    for (token, value) in tokens {
        url = url.replace(token, value);
    }
    Some(url)
}

/// URL of a configuration file, `None` without a server prefix.
pub fn build_config_url(
    remote: &RemoteConfig,
    key_prefix: &str,
    extension: &str,
) -> Option<String> {
    substitute(
        remote,
        &remote.target_url_pattern,
        &[(CONFIG_KEY_PREFIX, key_prefix), (CONFIG_FILE_EXTENSION, extension)],
    )
}

/// URL of an extra resource file given its path relative to the folder.
pub fn build_extra_url(remote: &RemoteConfig, extra_path: &str) -> Option<String> {
    substitute(
        remote,
        &remote.extra_target_url_pattern,
        &[(EXTRA_FILE_PATH, extra_path)],
    )
}
