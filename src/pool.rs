//! Local worker pools

use std::num::NonZeroUsize;
use std::thread;

use rayon::ThreadPool;

use crate::error::{Error, Result};

/// Logical cores on the host (1 when unknown)
pub fn host_cores() -> usize {
    thread::available_parallelism().map(NonZeroUsize::get).unwrap_or(1)
}

/// Build a pool with `threads` workers (at least one)
///
/// Pools are local: `build_global` can run once per process, and nested
/// loops need differently sized pools.
pub(crate) fn local_pool(threads: usize) -> Result<ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build()
        .map_err(|e| Error::Pool(format!("failed to create a pool of {threads} threads: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_has_requested_threads() {
        let pool = local_pool(3).unwrap();
        assert_eq!(pool.current_num_threads(), 3);
    }

    #[test]
    fn test_zero_threads_becomes_one() {
        let pool = local_pool(0).unwrap();
        assert_eq!(pool.current_num_threads(), 1);
        assert!(host_cores() >= 1);
    }
}
