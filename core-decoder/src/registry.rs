//! # Native Module Registry
//!
//! Instantiates each native module variant at most once and shares the
//! instance between decoders.
//!
//! ## Overview
//!
//! Compiling and instantiating a codec module is expensive, so decoders of
//! the same variant share one instance. The registry is an explicit value
//! passed to every [`StreamDecoder`](crate::StreamDecoder) and
//! [`DecoderWorker`](crate::DecoderWorker) rather than a process global:
//!
//! - [`register`](ModuleRegistry::register) installs the loader for a variant
//! - [`module`](ModuleRegistry::module) resolves the shared instance, running
//!   the loader on first use (concurrent callers wait for the same load)
//! - [`instantiate`](ModuleRegistry::instantiate) runs the loader for a
//!   module owned by a single decoder, bypassing the cache
//! - [`teardown`](ModuleRegistry::teardown) forgets the instance; decoders
//!   still holding it keep it alive until they are freed
//!
//! Decoders sharing a module serialize on its lock for the duration of each
//! decode call. Worker decoders therefore instantiate their own module so
//! that workers decode in parallel.
//!
//! A failed load is not cached; the next caller retries.

use crate::arena::{share_module, SharedModule};
use crate::error::{DecoderError, Result};
use bridge_traits::{DecoderVariant, ModuleLoader};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

/// Per-variant loaders and lazily instantiated modules.
#[derive(Default)]
pub struct ModuleRegistry {
    loaders: RwLock<HashMap<DecoderVariant, Arc<dyn ModuleLoader>>>,
    modules: Mutex<HashMap<DecoderVariant, Arc<OnceCell<SharedModule>>>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_loader(self, variant: DecoderVariant, loader: Arc<dyn ModuleLoader>) -> Self {
        self.register(variant, loader);
        self
    }

    /// Install the loader for `variant`, returning the one it replaces.
    ///
    /// An already instantiated module is kept until [`teardown`](Self::teardown).
    pub fn register(
        &self,
        variant: DecoderVariant,
        loader: Arc<dyn ModuleLoader>,
    ) -> Option<Arc<dyn ModuleLoader>> {
        debug!(%variant, "registered native module loader");
        self.loaders.write().insert(variant, loader)
    }

    pub fn has_loader(&self, variant: DecoderVariant) -> bool {
        self.loaders.read().contains_key(&variant)
    }

    /// Whether the module for `variant` is currently instantiated.
    pub fn is_loaded(&self, variant: DecoderVariant) -> bool {
        self.modules
            .lock()
            .get(&variant)
            .is_some_and(|cell| cell.initialized())
    }

    /// Resolve the shared module for `variant`, instantiating it on first use.
    ///
    /// Resolving is the module readiness signal; no native buffer may be
    /// allocated before it completes.
    #[instrument(skip(self))]
    pub async fn module(&self, variant: DecoderVariant) -> Result<SharedModule> {
        let loader = self.loader(variant)?;
        let cell = Arc::clone(self.modules.lock().entry(variant).or_default());

        let module = cell.get_or_try_init(|| load_module(variant, loader)).await?;
        Ok(Arc::clone(module))
    }

    /// Instantiate a module for `variant` that only the caller holds.
    ///
    /// Runs the loader on every call; the result is never cached.
    #[instrument(skip(self))]
    pub async fn instantiate(&self, variant: DecoderVariant) -> Result<SharedModule> {
        let loader = self.loader(variant)?;
        load_module(variant, loader).await
    }

    /// Forget the instantiated module for `variant`.
    ///
    /// Returns `true` if an instance (or an in-progress load) was dropped.
    pub fn teardown(&self, variant: DecoderVariant) -> bool {
        let removed = self.modules.lock().remove(&variant).is_some();
        if removed {
            debug!(%variant, "tore down native module");
        }
        removed
    }

    fn loader(&self, variant: DecoderVariant) -> Result<Arc<dyn ModuleLoader>> {
        self.loaders.read().get(&variant).cloned().ok_or_else(|| {
            DecoderError::ModuleUnavailable(format!("no loader registered for {}", variant))
        })
    }
}

async fn load_module(variant: DecoderVariant, loader: Arc<dyn ModuleLoader>) -> Result<SharedModule> {
    let module = loader.load().await.map_err(|e| {
        warn!(%variant, error = %e, "native module failed to load");
        DecoderError::ModuleUnavailable(format!("{} module failed to load: {}", variant, e))
    })?;
    info!(%variant, library = module.library(), "native module instantiated");
    Ok(share_module(module))
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let loaders: Vec<DecoderVariant> = self.loaders.read().keys().copied().collect();
        let loaded: Vec<DecoderVariant> = self
            .modules
            .lock()
            .iter()
            .filter(|(_, cell)| cell.initialized())
            .map(|(variant, _)| *variant)
            .collect();
        f.debug_struct("ModuleRegistry")
            .field("loaders", &loaders)
            .field("loaded", &loaded)
            .finish()
    }
}
