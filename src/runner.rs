// Pass runner - fan one pass out over worker threads
//
// Events are split into contiguous chunks, one per worker. Each worker owns a
// private SelectionContext over the shared read-only PassInputs; nothing is
// locked while events are processed. After every worker has joined, the
// outputs are merged, finalized and normalized on the calling thread.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crate::analysis::{EventRecord, Stage};
use crate::context::{PassInputs, SelectionContext, WorkerOutput};
use crate::error::CalibrationError;
use crate::merge::{merge_worker_outputs, reduce_pass, PassReport};

/// Number of workers actually used for `events` events
pub fn effective_workers(requested: usize, events: usize) -> usize {
    requested.max(1).min(events.max(1))
}

fn run_worker(inputs: Arc<PassInputs>, events: &[EventRecord]) -> WorkerOutput {
    let mut context = SelectionContext::new(inputs);
    for event in events {
        context.process_event(event);
    }
    context.into_output()
}

/// Process every event of a pass and reduce the result
///
/// A panicking worker fails the whole pass by resuming the panic on the
/// calling thread.
///
/// # Errors
/// `CalibrationError::NoRandomEvents` when the pass saw no random-trigger
/// event.
pub fn run_pass(
    inputs: Arc<PassInputs>,
    events: &[EventRecord],
    workers: usize,
) -> Result<PassReport, CalibrationError> {
    let started = Instant::now();
    let workers = effective_workers(workers, events.len());
    let chunk_size = events.len().div_ceil(workers).max(1);

    tracing::info!(
        "[PassRunner] Processing {} events on {} workers",
        events.len(),
        workers
    );

    let outputs: Vec<WorkerOutput> = if events.is_empty() {
        vec![run_worker(Arc::clone(&inputs), events)]
    } else {
        thread::scope(|scope| {
            let handles: Vec<_> = events
                .chunks(chunk_size)
                .map(|chunk| {
                    let inputs = Arc::clone(&inputs);
                    scope.spawn(move || run_worker(inputs, chunk))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
                })
                .collect()
        })
    };

    let merged = merge_worker_outputs(outputs, &inputs.histograms)?;
    let report = reduce_pass(merged, &inputs)?;

    tracing::info!(
        "[PassRunner] Pass done in {:?}: {} read, {} accepted with trigger, {} accepted",
        started.elapsed(),
        report.counters.get(Stage::Read),
        report.counters.get(Stage::AcceptedWithTrigger),
        report.counters.get(Stage::Accepted)
    );
    Ok(report)
}
