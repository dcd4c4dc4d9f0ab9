use std::sync::Arc;

use tr_device::{Result, RuntimeConfig, RuntimeContext};

/// Opaque context handle that owns the allocator and device guard registries.
pub struct TRContext {
    pub runtime: Arc<RuntimeContext>,
}

impl TRContext {
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        Ok(Self {
            runtime: Arc::new(RuntimeContext::new(config)?),
        })
    }
}
