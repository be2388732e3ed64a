//! Routing registry: network identifier → adaptor.

use std::collections::HashMap;
use std::sync::Arc;

use crate::adaptor::ChainAdaptor;
use crate::error::ChainError;

/// Maps network identifiers to adaptors.
///
/// Filled once at startup and only read afterwards. Lookups ignore ASCII
/// case, so `"Ethereum"` and `"ethereum"` resolve to the same adaptor.
#[derive(Default, Clone)]
pub struct ChainDispatcher {
    registry: HashMap<String, Arc<dyn ChainAdaptor>>,
}

impl ChainDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `adaptor` under its own chain name. A later registration for
    /// the same name replaces the earlier one.
    pub fn register(&mut self, adaptor: Arc<dyn ChainAdaptor>) {
        let key = adaptor.chain_name().to_ascii_lowercase();
        tracing::info!(chain = %key, "registered chain adaptor");
        if self.registry.insert(key.clone(), adaptor).is_some() {
            tracing::warn!(chain = %key, "replaced existing chain adaptor");
        }
    }

    /// The adaptor for `chain`.
    pub fn adaptor(&self, chain: &str) -> Result<Arc<dyn ChainAdaptor>, ChainError> {
        self.registry
            .get(&chain.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| {
                tracing::warn!(chain, "request for unsupported chain");
                ChainError::UnsupportedChain(chain.to_string())
            })
    }

    pub fn is_supported(&self, chain: &str) -> bool {
        self.registry.contains_key(&chain.to_ascii_lowercase())
    }

    /// Registered identifiers, sorted.
    pub fn supported_chains(&self) -> Vec<String> {
        let mut chains: Vec<String> = self.registry.keys().cloned().collect();
        chains.sort();
        chains
    }
}

impl std::fmt::Debug for ChainDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainDispatcher")
            .field("chains", &self.supported_chains())
            .finish()
    }
}
