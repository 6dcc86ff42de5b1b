//! Outputs and inputs that record what happened to them

use faucet_rs::{Context, Output, Pipe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Collects every value delivered to it
#[derive(Clone)]
pub struct Recorder<T> {
    values: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone + Send + 'static> Recorder<T> {
    pub fn new() -> Self {
        Self {
            values: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn values(&self) -> Vec<T> {
        self.values.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.values.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&self, value: T) {
        self.values.lock().unwrap().push(value);
    }
}

impl<T: Clone + Send + 'static> Output<T> for Recorder<T> {
    fn deliver(&mut self, _ctx: &Context, value: &T) -> anyhow::Result<()> {
        self.push(value.clone());
        Ok(())
    }
}

/// Delivery window of one output call
#[derive(Debug, Clone, Copy)]
pub struct Span {
    pub value: u64,
    pub started: Instant,
    pub finished: Instant,
}

/// Register an output that sleeps for `work` and records its delivery window.
pub fn add_timed_output(pipe: &Pipe<u64>, spans: &Recorder<Span>, work: std::time::Duration) {
    let spans = spans.clone();
    pipe.add_output(move |_, value: &u64| {
        let started = Instant::now();
        std::thread::sleep(work);
        spans.push(Span {
            value: *value,
            started,
            finished: Instant::now(),
        });
        Ok(())
    });
}

/// Input that is always found, yielding 1, 2, 3, ...
pub fn counting_input() -> impl FnMut(&Context) -> anyhow::Result<Option<u64>> + Send + 'static {
    let next = AtomicUsize::new(0);
    move |_: &Context| Ok(Some(next.fetch_add(1, Ordering::SeqCst) as u64 + 1))
}

/// Flag raised the first time an output is called
pub fn tripwire<T: 'static>() -> (
    Arc<AtomicBool>,
    impl FnMut(&Context, &T) -> anyhow::Result<()> + Send + 'static,
) {
    let tripped = Arc::new(AtomicBool::new(false));
    let flag = tripped.clone();
    (tripped, move |_: &Context, _: &T| -> anyhow::Result<()> {
        flag.store(true, Ordering::SeqCst);
        Ok(())
    })
}
