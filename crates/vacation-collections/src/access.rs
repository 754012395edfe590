use std::sync::Arc;
use vacation_stm::{Aborted, TVar, Transaction};

/// Every tree operation is written once and runs down either of two
/// paths: transactional, for the parallel workload, or sequential, for
/// the setup/cleanup phases where no other thread can be touching the
/// tree at all. `Access` is the seam between them — it is the one
/// place that knows which path is live, so the traversal/rotation code
/// in `tree.rs` never has to branch on it itself.
pub(crate) enum Access<'a, 'b> {
    Transactional(&'a mut Transaction<'b>),
    Sequential,
}

impl<'a, 'b> Access<'a, 'b> {
    pub(crate) fn new(tx: Option<&'a mut Transaction<'b>>) -> Self {
        match tx {
            Some(tx) => Access::Transactional(tx),
            None => Access::Sequential,
        }
    }

    pub(crate) fn read<T: Clone + Send + Sync + 'static>(
        &mut self,
        tvar: &Arc<TVar<T>>,
    ) -> Result<T, Aborted> {
        match self {
            Access::Transactional(tx) => tx.read(tvar),
            Access::Sequential => Ok(tvar.read_untracked()),
        }
    }

    pub(crate) fn write<T: Clone + Send + Sync + 'static>(&mut self, tvar: &Arc<TVar<T>>, value: T) {
        match self {
            Access::Transactional(tx) => tx.write(tvar, value),
            Access::Sequential => tvar.write_untracked(value),
        }
    }

    pub(crate) fn alloc<T: Send + Sync + 'static>(&mut self, value: T) -> Arc<T> {
        match self {
            Access::Transactional(tx) => tx.alloc(value),
            Access::Sequential => Arc::new(value),
        }
    }

    pub(crate) fn free<T: Send + Sync + 'static>(&mut self, value: Arc<T>) {
        match self {
            Access::Transactional(tx) => tx.free(value),
            Access::Sequential => drop(value),
        }
    }
}
