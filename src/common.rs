use derive_new::new;
use futures::FutureExt;
use std::future::Future;

#[derive(Debug, new)]
pub struct FutureOutput<Output, Context> {
    pub output: Output,
    pub context: Context,
}

/// Pairs the output of `future` with `context`, so completions can be told apart
/// when polled out of order.
pub fn with_context<F, C>(future: F, context: C) -> impl Future<Output = FutureOutput<F::Output, C>>
where
    F: Future,
{
    future.map(|output| FutureOutput::new(output, context))
}
