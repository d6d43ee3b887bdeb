use crate::{ProxyError, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Header name used for the operator identity when the config names none
pub const DEFAULT_HEADER_NAME: &str = "X-ElQuePregunta";

/// Resolved rules driving header injection, blocking and redaction
///
/// # Examples
///
/// ```
/// use fwdproxy::transform::TransformDescriptor;
///
/// let descriptor = TransformDescriptor::new("X-Operator", "ops@example.com")
///     .block("/admin")
///     .replace("secret", "[redacted]");
///
/// assert!(descriptor.blocked_resources.contains("/admin"));
/// assert_eq!(descriptor.forbidden_word_replacements.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformDescriptor {
    /// Exact request targets that get a 403 instead of being forwarded
    pub blocked_resources: HashSet<String>,
    pub injected_header_name: String,
    pub injected_header_value: String,
    /// Applied in order; later pairs see the output of earlier ones
    pub forbidden_word_replacements: Vec<(String, String)>,
}

impl TransformDescriptor {
    pub fn new(header_name: &str, header_value: &str) -> Self {
        Self {
            injected_header_name: header_name.to_string(),
            injected_header_value: header_value.to_string(),
            ..Default::default()
        }
    }

    pub fn block(mut self, resource: &str) -> Self {
        self.blocked_resources.insert(resource.to_string());
        self
    }

    pub fn replace(mut self, word: &str, replacement: &str) -> Self {
        self.forbidden_word_replacements
            .push((word.to_string(), replacement.to_string()));
        self
    }
}

/// On-disk JSON configuration
///
/// ```json
/// {
///   "mail": "operator@example.com",
///   "blocked": ["/secret.html"],
///   "forbidden_words": [{"proxy": "[REDACTED]"}, {"DCC": "[REDACTED]"}]
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    /// Operator identity sent with every forwarded request
    #[serde(alias = "user")]
    pub mail: String,
    #[serde(default)]
    pub header_name: Option<String>,
    #[serde(default)]
    pub blocked: Vec<String>,
    /// Each entry is normally a single `{word: replacement}` object
    #[serde(default)]
    pub forbidden_words: Vec<IndexMap<String, String>>,
    #[serde(default)]
    pub listen: Option<SocketAddr>,
    #[serde(default)]
    pub buffer_size: Option<usize>,
}

impl ConfigFile {
    pub fn from_json(content: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Reads and parses the config file at `path`
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ProxyError::ConfigUnavailable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        Self::from_json(&content).map_err(|e| ProxyError::ConfigUnavailable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn descriptor(&self) -> TransformDescriptor {
        let header_name = self.header_name.as_deref().unwrap_or(DEFAULT_HEADER_NAME);
        let mut descriptor = TransformDescriptor::new(header_name, &self.mail);

        descriptor.blocked_resources = self.blocked.iter().cloned().collect();
        descriptor.forbidden_word_replacements = self
            .forbidden_words
            .iter()
            .flat_map(|entry| entry.iter())
            .map(|(word, replacement)| (word.clone(), replacement.clone()))
            .collect();

        descriptor
    }
}

/// Where a pipeline gets its transform rules from
#[derive(Debug, Clone)]
pub enum DescriptorSource {
    /// Fixed rules shared by every connection
    Static(Arc<TransformDescriptor>),
    /// Config file re-read for every connection, so edits apply without a restart
    File(PathBuf),
}

impl DescriptorSource {
    pub async fn load(&self) -> Result<Arc<TransformDescriptor>> {
        match self {
            DescriptorSource::Static(descriptor) => Ok(descriptor.clone()),
            DescriptorSource::File(path) => {
                let config = ConfigFile::load(path).await?;
                Ok(Arc::new(config.descriptor()))
            }
        }
    }
}

impl From<TransformDescriptor> for DescriptorSource {
    fn from(descriptor: TransformDescriptor) -> Self {
        DescriptorSource::Static(Arc::new(descriptor))
    }
}
