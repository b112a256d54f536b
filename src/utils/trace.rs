//! Pipeline tracing.
//!
//! Every line goes to `log` at TRACE on [`TARGET`]. Tests can additionally
//! open a [`Capture`] to collect the lines emitted on their own thread.

use std::cell::{Cell, RefCell};
use std::fmt;

pub const TARGET: &str = "sequeldoc::pipeline";

thread_local! {
    static OPEN: Cell<usize> = const { Cell::new(0) };
    static LINES: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Collects pipeline lines on the current thread while alive.
///
/// Captures nest; the buffer is shared and cleared when the outermost one closes.
#[must_use = "lines are only collected while the capture is alive"]
pub struct Capture {
    _not_send: std::marker::PhantomData<*const ()>,
}

impl Capture {
    /// Removes and returns everything collected so far.
    pub fn take(&self) -> Vec<String> {
        LINES.with(|l| std::mem::take(&mut *l.borrow_mut()))
    }

    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        LINES.with(|l| l.borrow().clone())
    }
}

impl Drop for Capture {
    fn drop(&mut self) {
        let left = OPEN.with(|o| {
            let n = o.get().saturating_sub(1);
            o.set(n);
            n
        });
        if left == 0 {
            LINES.with(|l| l.borrow_mut().clear());
        }
    }
}

pub fn capture() -> Capture {
    OPEN.with(|o| o.set(o.get() + 1));
    Capture { _not_send: std::marker::PhantomData }
}

#[doc(hidden)]
pub fn emit(args: fmt::Arguments<'_>) {
    log::trace!(target: TARGET, "{args}");
    if OPEN.with(Cell::get) > 0 {
        LINES.with(|l| l.borrow_mut().push(args.to_string()));
    }
}

/// Emits one pipeline trace line.
#[macro_export]
macro_rules! pipeline_trace {
    ($($arg:tt)*) => {
        $crate::utils::trace::emit(format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_is_kept_without_a_capture() {
        crate::pipeline_trace!("dropped");
        let cap = capture();
        assert!(cap.lines().is_empty());
    }

    #[test]
    fn capture_collects_and_takes() {
        let cap = capture();
        crate::pipeline_trace!("stages={}", 3);
        crate::pipeline_trace!("done");
        assert_eq!(cap.lines(), ["stages=3", "done"]);
        assert_eq!(cap.take().len(), 2);
        assert!(cap.lines().is_empty());
    }

    #[test]
    fn nested_capture_keeps_buffer_until_outermost_closes() {
        let outer = capture();
        {
            let _inner = capture();
            crate::pipeline_trace!("inner");
        }
        assert_eq!(outer.lines(), ["inner"]);
        drop(outer);
        let cap = capture();
        assert!(cap.lines().is_empty());
    }

    #[test]
    fn other_threads_are_isolated() {
        let cap = capture();
        crate::pipeline_trace!("main");
        let child = std::thread::spawn(|| {
            crate::pipeline_trace!("child");
            let c = capture();
            c.lines()
        })
        .join()
        .unwrap();
        assert!(child.is_empty());
        assert_eq!(cap.lines(), ["main"]);
    }
}
