#![forbid(unsafe_code)]

//! Guards applied before the server does any work on behalf of a caller.

use nix::unistd::Uid;
use url::Url;

use crate::error::{Error, Result};

const NO_URL: &str = "No URL provided";
const INVALID_URL: &str = "Please provide a valid YouTube URL";

/// Fails fast when the server is started as root.
pub fn ensure_not_root(process: &str) -> anyhow::Result<()> {
    ensure_not_root_for(Uid::current(), process)
}

fn ensure_not_root_for(uid: Uid, process: &str) -> anyhow::Result<()> {
    if uid.is_root() {
        anyhow::bail!(
            "{process} must not be run as root; use a regular user or a dedicated service account"
        );
    }
    Ok(())
}

/// Parses `raw` and checks its host against `allowed_hosts` (exact,
/// case-insensitive match). Only http and https are accepted.
pub fn validate_source_url(raw: Option<&str>, allowed_hosts: &[String]) -> Result<Url> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(Error::invalid_input(NO_URL));
    }
    let url = Url::parse(raw).map_err(|_| Error::invalid_input(INVALID_URL))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::invalid_input(INVALID_URL));
    }
    let Some(host) = url.host_str() else {
        return Err(Error::invalid_input(INVALID_URL));
    };
    if !allowed_hosts
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(host))
    {
        return Err(Error::invalid_input(INVALID_URL));
    }
    Ok(url)
}
