//! Sandbox language
//!
//! A small Java-like language served to the engine through the collaborator
//! traits: [`TextWrapper`] wraps fragments, [`SandboxCompiler`] checks and
//! generates class files, [`SandboxHost`] loads and runs them. [`classify`]
//! turns user input into snippet drafts.

pub mod check;
pub mod classfile;
pub mod classify;
pub mod compiler;
pub mod host;
pub mod interp;
pub mod library;
pub mod syntax;
pub mod types;
pub mod value;
pub mod wrap;

use std::sync::Arc;

use tracing::warn;

use crate::engine::Engine;
use crate::service::{Compiler, LibraryIndexer, PooledCompiler};
use crate::util::config::EngineConfig;

pub use classify::{classify, classify_snippet};
pub use compiler::SandboxCompiler;
pub use host::SandboxHost;
pub use library::Library;
pub use wrap::TextWrapper;

/// Builds engines wired to the sandbox services
#[derive(Debug, Clone, Default)]
pub struct Sandbox {
    host: Arc<SandboxHost>,
}

impl Sandbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host shared by every engine this sandbox builds
    pub fn host(&self) -> &Arc<SandboxHost> {
        &self.host
    }

    /// Engine over a wrapper, a pooled compiler, and this sandbox's host
    ///
    /// The compiler runs unpooled if the pool cannot be created. The library
    /// index starts only when `config.index_library` is set and its thread
    /// could be spawned.
    pub fn engine(
        &self,
        config: EngineConfig,
    ) -> Engine {
        let compiler: Arc<dyn Compiler> = {
            let inner: Arc<dyn Compiler> = Arc::new(SandboxCompiler::new(config.entry_point.clone()));
            match PooledCompiler::new(Arc::clone(&inner), config.compiler_threads) {
                Ok(pooled) => Arc::new(pooled),
                Err(err) => {
                    warn!(%err, "compiler pool unavailable, compiling on the caller's thread");
                    inner
                }
            }
        };
        let indexer = if config.index_library {
            match LibraryIndexer::start() {
                Ok(indexer) => {
                    indexer.submit(Library::get().index_entries());
                    Some(indexer)
                }
                Err(err) => {
                    warn!(%err, "library indexer unavailable");
                    None
                }
            }
        } else {
            None
        };

        let engine = Engine::new(config, Arc::new(TextWrapper::new()), compiler, self.host.clone());
        match indexer {
            Some(indexer) => engine.with_indexer(indexer),
            None => engine,
        }
    }
}
