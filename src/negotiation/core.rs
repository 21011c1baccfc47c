//! Media-type registry and provided-format sets.

use serde_json::Value;
use std::collections::HashMap;

/// Serialize a rendered object into this format's wire representation.
/// The second argument carries per-format transform arguments, if declared.
pub type TransformFn = fn(&Value, Option<&Value>) -> anyhow::Result<String>;

/// One registered response format: its canonical key, the media-type strings
/// it answers to (first one is emitted as Content-Type), any extra response
/// headers, and an optional object transform.
#[derive(Clone)]
pub struct MediaType {
    pub key: String,
    pub media_types: Vec<String>,
    pub response_headers: Vec<(String, String)>,
    pub transform: Option<TransformFn>,
    /// Default arguments handed to the transform when the controller did not
    /// declare its own.
    pub transform_defaults: Option<Value>,
}

impl MediaType {
    #[must_use]
    pub fn new(key: &str, media_types: &[&str]) -> Self {
        MediaType {
            key: key.to_string(),
            media_types: media_types.iter().map(|s| s.to_string()).collect(),
            response_headers: Vec::new(),
            transform: None,
            transform_defaults: None,
        }
    }

    #[must_use]
    pub fn with_transform(mut self, transform: TransformFn) -> Self {
        self.transform = Some(transform);
        self
    }

    #[must_use]
    pub fn with_response_header(mut self, name: &str, value: &str) -> Self {
        self.response_headers.push((name.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn with_transform_defaults(mut self, defaults: Value) -> Self {
        self.transform_defaults = Some(defaults);
        self
    }
}

impl std::fmt::Debug for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaType")
            .field("key", &self.key)
            .field("media_types", &self.media_types)
            .field("has_transform", &self.transform.is_some())
            .finish()
    }
}

fn to_json(value: &Value, _args: Option<&Value>) -> anyhow::Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn to_yaml(value: &Value, _args: Option<&Value>) -> anyhow::Result<String> {
    Ok(serde_yaml::to_string(value)?)
}

fn to_text(value: &Value, _args: Option<&Value>) -> anyhow::Result<String> {
    Ok(match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

/// Static table mapping format keys to media-type synonyms, configured at
/// boot and extensible at runtime before the dispatcher starts serving.
///
/// Registration order matters: it decides nothing about negotiation (that is
/// the provided-format order), but the first media type of each entry is the
/// Content-Type emitted for that format.
#[derive(Debug, Clone)]
pub struct MediaRegistry {
    types: Vec<MediaType>,
}

impl MediaRegistry {
    /// An empty registry. Most callers want [`MediaRegistry::with_defaults`].
    #[must_use]
    pub fn empty() -> Self {
        MediaRegistry { types: Vec::new() }
    }

    /// The boot-time default table.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.add(MediaType::new("all", &["*/*"]));
        registry.add(MediaType::new("yaml", &["application/x-yaml", "text/yaml"]).with_transform(to_yaml));
        registry.add(MediaType::new("text", &["text/plain"]).with_transform(to_text));
        registry.add(MediaType::new(
            "html",
            &["text/html", "application/xhtml+xml", "application/html"],
        ));
        registry.add(
            MediaType::new("xml", &["application/xml", "text/xml", "application/x-xml"])
                .with_response_header("Encoding", "UTF-8"),
        );
        registry.add(
            MediaType::new(
                "js",
                &["text/javascript", "application/javascript", "application/x-javascript"],
            )
            .with_transform(to_json),
        );
        registry.add(MediaType::new("json", &["application/json", "text/x-json"]).with_transform(to_json));
        registry
    }

    /// Register a format, replacing any existing entry with the same key.
    pub fn add(&mut self, media_type: MediaType) {
        if let Some(existing) = self.types.iter_mut().find(|t| t.key == media_type.key) {
            *existing = media_type;
        } else {
            self.types.push(media_type);
        }
    }

    /// Remove a format. The universal `all` entry cannot be removed.
    pub fn remove(&mut self, key: &str) -> bool {
        if key == "all" {
            return false;
        }
        let before = self.types.len();
        self.types.retain(|t| t.key != key);
        self.types.len() != before
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&MediaType> {
        self.types.iter().find(|t| t.key == key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Canonical format key for a media-range string, via the synonym table.
    #[must_use]
    pub fn canonical_format(&self, media_range: &str) -> Option<&str> {
        self.types
            .iter()
            .find(|t| t.media_types.iter().any(|m| m == media_range))
            .map(|t| t.key.as_str())
    }

    /// The Content-Type emitted for a format (its first media type).
    #[must_use]
    pub fn content_type_for(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|t| t.media_types.first()).map(String::as_str)
    }
}

impl Default for MediaRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// The ordered set of formats a controller (or a single request, via
/// copy-on-write) declares it can produce, with optional per-format
/// transform arguments.
#[derive(Debug, Clone)]
pub struct ProvidedFormats {
    formats: Vec<String>,
    arguments: HashMap<String, Value>,
}

impl ProvidedFormats {
    /// The boot default: `html` only.
    #[must_use]
    pub fn html_default() -> Self {
        ProvidedFormats {
            formats: vec!["html".to_string()],
            arguments: HashMap::new(),
        }
    }

    #[must_use]
    pub fn empty() -> Self {
        ProvidedFormats {
            formats: Vec::new(),
            arguments: HashMap::new(),
        }
    }

    /// Add formats to the set, keeping declaration order and ignoring
    /// duplicates. Arguments, when given, apply to each added format.
    pub fn provides(&mut self, formats: &[&str], arguments: Option<Value>) {
        for fmt in formats {
            if !self.formats.iter().any(|f| f == fmt) {
                self.formats.push((*fmt).to_string());
            }
            if let Some(args) = &arguments {
                self.arguments.insert((*fmt).to_string(), args.clone());
            }
        }
    }

    /// Replace the set wholesale.
    pub fn only(&mut self, formats: &[&str]) {
        self.formats.clear();
        self.arguments.clear();
        self.provides(formats, None);
    }

    /// Remove formats and their arguments.
    pub fn remove(&mut self, formats: &[&str]) {
        self.formats.retain(|f| !formats.contains(&f.as_str()));
        for fmt in formats {
            self.arguments.remove(*fmt);
        }
    }

    #[must_use]
    pub fn first(&self) -> Option<&str> {
        self.formats.first().map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, format: &str) -> bool {
        self.formats.iter().any(|f| f == format)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.formats.iter().map(String::as_str)
    }

    /// Declared transform arguments for a format, if any.
    #[must_use]
    pub fn arguments_for(&self, format: &str) -> Option<&Value> {
        self.arguments.get(format)
    }
}

impl Default for ProvidedFormats {
    fn default() -> Self {
        Self::html_default()
    }
}
