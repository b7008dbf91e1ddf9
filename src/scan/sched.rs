use std::{
    panic::{self, AssertUnwindSafe},
    thread,
};

use rayon::prelude::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};

use crate::error::ScanError;

use super::ScanContext;

/// How worker slices are turned into running workers. Both disciplines
/// block until every slice has been drained, and neither lets one failed
/// worker take down its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// One OS thread per non-empty slice, joined directly.
    Threads,
    /// Slices submitted to a fixed-size worker pool.
    Pool,
}

impl Schedule {
    pub(crate) fn execute(
        &self,
        context: &ScanContext<'_>,
        slices: &[Vec<u16>],
    ) -> Result<(), ScanError> {
        match self {
            Schedule::Threads => {
                Self::spawned(context, slices);
                Ok(())
            }
            Schedule::Pool => Self::pooled(context, slices),
        }
    }

    fn spawned(context: &ScanContext<'_>, slices: &[Vec<u16>]) {
        thread::scope(|scope| {
            let workers = slices
                .iter()
                .enumerate()
                .filter(|(_, slice)| !slice.is_empty())
                .map(|(worker, slice)| {
                    (worker, scope.spawn(move || context.run_slice(worker, slice)))
                })
                .collect::<Vec<_>>();

            for (worker, handle) in workers {
                if handle.join().is_err() {
                    log::error!("Worker {} failed; the remaining workers keep running", worker);
                }
            }
        });
    }

    fn pooled(context: &ScanContext<'_>, slices: &[Vec<u16>]) -> Result<(), ScanError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(slices.len())
            .build()
            .map_err(ScanError::WorkerPoolFailed)?;

        pool.install(|| {
            slices
                .par_iter()
                .enumerate()
                .filter(|(_, slice)| !slice.is_empty())
                .for_each(|(worker, slice)| {
                    // A panicking slice must not unwind into the pool.
                    let run =
                        panic::catch_unwind(AssertUnwindSafe(|| context.run_slice(worker, slice)));
                    if run.is_err() {
                        log::error!(
                            "Worker {} failed; the remaining workers keep running",
                            worker
                        );
                    }
                });
        });

        Ok(())
    }
}
