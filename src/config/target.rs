use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use url::Url;

use super::error::ConfigError;

/// A validated endpoint to probe.
///
/// The label is the operator's input with the scheme defaulted to `http`,
/// and is what appears as the `url` label on every exported series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    label: String,
    url: Url,
}

impl ProbeTarget {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim();
        let label = if has_scheme(trimmed) {
            trimmed.to_string()
        } else {
            log::info!("Target `{trimmed}` has no scheme, falling back to http");
            format!("http://{trimmed}")
        };

        let url = Url::parse(&label).map_err(|source| ConfigError::MalformedTarget {
            target: trimmed.to_string(),
            source,
        })?;

        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(ConfigError::UnsupportedScheme {
                    target: trimmed.to_string(),
                    scheme: scheme.to_string(),
                });
            }
        }

        if url.host_str().is_none_or(str::is_empty) {
            return Err(ConfigError::MissingHost(trimmed.to_string()));
        }

        Ok(Self { label, url })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_tls(&self) -> bool {
        self.url.scheme() == "https"
    }
}

/// True when `input` starts with `scheme://`. A `://` after the first path,
/// query or fragment delimiter belongs to the URL body, not the scheme.
fn has_scheme(input: &str) -> bool {
    input
        .find("://")
        .is_some_and(|at| at > 0 && !input[..at].contains(['/', '?', '#']))
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Splits a delimited target list into probe targets, preserving order.
/// Blank entries are skipped; the first malformed entry aborts the whole list.
/// Entries that end up with the same label are probed once, under the first.
pub fn parse_targets(list: &str, delimiter: &str) -> Result<Arc<[ProbeTarget]>, ConfigError> {
    if delimiter.is_empty() {
        return Err(ConfigError::EmptyDelimiter);
    }

    let mut seen = HashSet::new();
    let mut targets = Vec::new();
    for entry in list.split(delimiter).filter(|entry| !entry.trim().is_empty()) {
        let target = ProbeTarget::parse(entry)?;
        if !seen.insert(target.label.clone()) {
            log::warn!("Ignoring duplicate target `{}` ({})", entry.trim(), target.label);
            continue;
        }
        targets.push(target);
    }

    if targets.is_empty() {
        return Err(ConfigError::NoTargets);
    }

    Ok(targets.into())
}
