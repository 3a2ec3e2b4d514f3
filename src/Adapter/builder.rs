use super::strategy::StagingStrategy;
use super::MessageAdapter;
use crate::Core::alloc::{AcceleratorAllocator, AllocatorSet, HostAllocator, MemoryAllocator};
use crate::error::Result;
use std::env;
use std::sync::Arc;

/// Runtime knobs for the adapter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AdapterConfig {
    /// Peers may use a different data representation. Disables the zero-copy
    /// fast path and forces every non-empty message through a staging buffer
    /// so the descriptor's pack/unpack can translate it.
    pub heterogeneous: bool,

    /// Upper bound on the bytes handed to one `pack`/`unpack` call. `None`
    /// packs the whole message in a single call.
    pub max_pack_chunk: Option<usize>,
}

impl AdapterConfig {
    pub const ENV_HETEROGENEOUS: &'static str = "DMXP_MSGBUF_HETEROGENEOUS";
    pub const ENV_MAX_PACK_CHUNK: &'static str = "DMXP_MSGBUF_MAX_PACK_CHUNK";

    /// Read overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read overrides through `lookup`; unparsable values are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(Self::ENV_HETEROGENEOUS) {
            match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => config.heterogeneous = true,
                "0" | "false" | "no" | "off" | "" => config.heterogeneous = false,
                other => tracing::warn!(
                    key = Self::ENV_HETEROGENEOUS,
                    value = other,
                    "ignoring unrecognised boolean"
                ),
            }
        }

        if let Some(raw) = lookup(Self::ENV_MAX_PACK_CHUNK) {
            match raw.trim().parse::<usize>() {
                Ok(0) => config.max_pack_chunk = None,
                Ok(n) => config.max_pack_chunk = Some(n),
                Err(e) => tracing::warn!(
                    key = Self::ENV_MAX_PACK_CHUNK,
                    value = %raw,
                    error = %e,
                    "ignoring unparsable chunk size"
                ),
            }
        }

        config
    }
}

pub struct AdapterBuilder {
    config: AdapterConfig,
    host: Option<Arc<dyn MemoryAllocator>>,
    accelerator: Option<Arc<dyn MemoryAllocator>>,
    arena_size: usize,
}

impl Default for AdapterBuilder {
    fn default() -> Self {
        Self {
            config: AdapterConfig::default(),
            host: None,
            accelerator: None,
            arena_size: 16 * 1024 * 1024, // 16MB default accelerator arena
        }
    }
}

impl AdapterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the environment overrides instead of the defaults.
    pub fn from_env() -> Self {
        Self::default().with_config(AdapterConfig::from_env())
    }

    pub fn with_config(mut self, config: AdapterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_heterogeneous(mut self, heterogeneous: bool) -> Self {
        self.config.heterogeneous = heterogeneous;
        self
    }

    pub fn with_max_pack_chunk(mut self, chunk: usize) -> Self {
        self.config.max_pack_chunk = (chunk > 0).then_some(chunk);
        self
    }

    pub fn with_host_allocator(mut self, allocator: Arc<dyn MemoryAllocator>) -> Self {
        self.host = Some(allocator);
        self
    }

    pub fn with_accelerator_allocator(mut self, allocator: Arc<dyn MemoryAllocator>) -> Self {
        self.accelerator = Some(allocator);
        self
    }

    /// Size of the accelerator arena mapped when no accelerator allocator is given.
    pub fn with_arena_size(mut self, size: usize) -> Self {
        self.arena_size = size;
        self
    }

    pub fn build(self) -> Result<MessageAdapter> {
        let host = match self.host {
            Some(host) => host,
            None => HostAllocator::global() as Arc<dyn MemoryAllocator>,
        };
        let accelerator = match self.accelerator {
            Some(accelerator) => accelerator,
            None => Arc::new(AcceleratorAllocator::new(self.arena_size)?) as Arc<dyn MemoryAllocator>,
        };
        let allocators = AllocatorSet::new(host, accelerator);

        tracing::debug!(
            heterogeneous = self.config.heterogeneous,
            max_pack_chunk = ?self.config.max_pack_chunk,
            "message adapter configured"
        );

        Ok(MessageAdapter {
            host: StagingStrategy::new(Arc::clone(allocators.host()), self.config),
            accelerator: StagingStrategy::new(Arc::clone(allocators.accelerator()), self.config),
            allocators,
            config: self.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_overrides_are_parsed() {
        let config = AdapterConfig::from_lookup(lookup(&[
            (AdapterConfig::ENV_HETEROGENEOUS, "Yes"),
            (AdapterConfig::ENV_MAX_PACK_CHUNK, "4096"),
        ]));
        assert!(config.heterogeneous);
        assert_eq!(config.max_pack_chunk, Some(4096));
    }

    #[test]
    fn bad_env_values_fall_back_to_defaults() {
        let config = AdapterConfig::from_lookup(lookup(&[
            (AdapterConfig::ENV_HETEROGENEOUS, "maybe"),
            (AdapterConfig::ENV_MAX_PACK_CHUNK, "lots"),
        ]));
        assert_eq!(config, AdapterConfig::default());

        let config = AdapterConfig::from_lookup(lookup(&[(AdapterConfig::ENV_MAX_PACK_CHUNK, "0")]));
        assert_eq!(config.max_pack_chunk, None);
    }

    #[test]
    fn zero_chunk_means_single_call() {
        let builder = AdapterBuilder::new().with_max_pack_chunk(0);
        assert_eq!(builder.config.max_pack_chunk, None);
    }
}
