//! Bounded compiler worker pool
//!
//! [`PooledCompiler`] runs every request of the wrapped compiler inside a
//! dedicated rayon pool, so parallel work done by the compiler (the sandbox
//! compiler analyzes units with `par_iter`) never exceeds the configured
//! number of threads. Clones share the pool, which lets several engines use
//! one set of workers.

use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use tracing::debug;

use super::{AnalysisOutcome, CompilationUnit, Compiler, GenerationOutcome};

/// Compiler whose requests run on a shared, bounded thread pool
#[derive(Clone)]
pub struct PooledCompiler {
    inner: Arc<dyn Compiler>,
    pool: Arc<ThreadPool>,
}

impl PooledCompiler {
    /// Wrap `inner` in a pool of `threads` workers (0 = one per CPU)
    pub fn new(
        inner: Arc<dyn Compiler>,
        threads: usize,
    ) -> Result<Self, ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("compiler-worker-{}", index))
            .build()?;
        debug!(threads = pool.current_num_threads(), "compiler pool started");
        Ok(Self {
            inner,
            pool: Arc::new(pool),
        })
    }

    /// Number of worker threads
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl Compiler for PooledCompiler {
    fn analyze(
        &self,
        batch: &[CompilationUnit],
    ) -> AnalysisOutcome {
        self.pool.install(|| self.inner.analyze(batch))
    }

    fn generate(
        &self,
        batch: &[CompilationUnit],
    ) -> GenerationOutcome {
        self.pool.install(|| self.inner.generate(batch))
    }
}

impl std::fmt::Debug for PooledCompiler {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("PooledCompiler")
            .field("threads", &self.threads())
            .finish_non_exhaustive()
    }
}
