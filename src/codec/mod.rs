//! Value codecs.
//!
//! Sensitive settings (the remote auth password, for instance) may be stored
//! encoded as `[codec:payload]`. The registry resolves the codec by name and
//! decodes the payload; plain values pass through untouched.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{SyncError, SyncResult};

pub trait ConfigCodec: Send + Sync {
    fn name(&self) -> &str;
    fn encode(&self, value: &str) -> SyncResult<String>;
    fn decode(&self, value: &str) -> SyncResult<String>;
}

/// Standard alphabet base64 with padding.
#[derive(Debug, Default, Clone, Copy)]
pub struct Base64Codec;

impl ConfigCodec for Base64Codec {
    fn name(&self) -> &str {
        "base64"
    }

    fn encode(&self, value: &str) -> SyncResult<String> {
        Ok(STANDARD.encode(value.as_bytes()))
    }

    fn decode(&self, value: &str) -> SyncResult<String> {
        let raw = STANDARD
            .decode(value.trim())
            .map_err(|e| SyncError::Codec(format!("invalid base64: {}", e)))?;
        String::from_utf8(raw).map_err(|e| SyncError::Codec(format!("invalid utf-8: {}", e)))
    }
}

#[derive(Clone, Default)]
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn ConfigCodec>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in codecs.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(Base64Codec));
        registry
    }

    pub fn register(&mut self, codec: Arc<dyn ConfigCodec>) {
        self.codecs.insert(codec.name().to_string(), codec);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ConfigCodec>> {
        self.codecs.get(name).cloned()
    }

    /// Split `[name:payload]` into its parts.
    fn split_encoded(raw: &str) -> Option<(&str, &str)> {
        let inner = raw.strip_prefix('[')?.strip_suffix(']')?;
        let (name, payload) = inner.split_once(':')?;
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return None;
        }
        Some((name, payload))
    }

    /// Decode `[name:payload]`, or return the value unchanged when not encoded.
    pub fn decode_value(&self, raw: &str) -> SyncResult<String> {
        let Some((name, payload)) = Self::split_encoded(raw.trim()) else {
            return Ok(raw.to_string());
        };
        let codec = self
            .get(name)
            .ok_or_else(|| SyncError::Codec(format!("unknown codec '{}'", name)))?;
        codec.decode(payload)
    }

    /// Encode `value` as `[name:payload]`.
    pub fn encode_value(&self, name: &str, value: &str) -> SyncResult<String> {
        let codec = self
            .get(name)
            .ok_or_else(|| SyncError::Codec(format!("unknown codec '{}'", name)))?;
        Ok(format!("[{}:{}]", name, codec.encode(value)?))
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("codecs", &self.codecs.keys().collect::<Vec<_>>())
            .finish()
    }
}
