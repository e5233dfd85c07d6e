//! Panic recovery.
//!
//! [`Recover`] polls the rest of the chain inside `catch_unwind`. A panic
//! becomes a `500` response and a single `PANIC` error record carrying the
//! panic message and the stack captured where it happened.
//!
//! The stack is captured by a process-wide panic hook installed the first
//! time a `Recover` is built. Outside a recovery scope the hook defers to
//! whatever hook was installed before it.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Once;
use std::task::{Context, Poll};

use http::StatusCode;

use super::{BoxFuture, Middleware, Next};
use crate::error::HttpError;
use crate::request::Request;
use crate::response::IntoResponse;

/// Default limit on the logged stack trace: 1 KiB.
pub const DEFAULT_STACK_SIZE: usize = 1 << 10;

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
    static STACK: RefCell<Option<String>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

fn install_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if DEPTH.with(Cell::get) > 0 {
                let stack = Backtrace::force_capture().to_string();
                STACK.with(|s| *s.borrow_mut() = Some(stack));
            } else {
                previous(info);
            }
        }));
    });
}

/// Marks the current thread as inside a recovery scope while alive.
struct Scope;

impl Scope {
    fn enter() -> Self {
        DEPTH.with(|d| d.set(d.get() + 1));
        Self
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

/// What a recovered panic left behind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recovered {
    pub error: String,
    pub stack: String,
}

impl Recovered {
    fn new(payload: &(dyn Any + Send), stack: String, stack_size: usize) -> Self {
        Self { error: panic_message(payload), stack: truncate(stack, stack_size) }
    }
}

/// Reports a recovered panic at error level.
pub fn log_panic(recovered: &Recovered) {
    tracing::error!(error = %recovered.error, stack = %recovered.stack, "PANIC");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with a non-string payload".to_owned()
    }
}

fn truncate(mut stack: String, max: usize) -> String {
    if stack.len() > max {
        let mut end = max;
        while !stack.is_char_boundary(end) {
            end -= 1;
        }
        stack.truncate(end);
    }
    stack
}

pin_project_lite::pin_project! {
    struct CatchUnwind<F> {
        #[pin]
        inner: F,
    }
}

impl<F: Future> Future for CatchUnwind<F> {
    type Output = Result<F::Output, (Box<dyn Any + Send>, String)>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let inner = self.project().inner;
        let scope = Scope::enter();
        let polled = panic::catch_unwind(AssertUnwindSafe(|| inner.poll(cx)));
        drop(scope);
        match polled {
            Ok(Poll::Pending) => Poll::Pending,
            Ok(Poll::Ready(out)) => Poll::Ready(Ok(out)),
            Err(payload) => {
                let stack = STACK.with(|s| s.borrow_mut().take()).unwrap_or_default();
                Poll::Ready(Err((payload, stack)))
            }
        }
    }
}

/// Catches panics from the rest of the chain.
#[derive(Clone, Copy, Debug)]
pub struct Recover {
    stack_size: usize,
}

impl Recover {
    pub fn new() -> Self {
        install_hook();
        Self { stack_size: DEFAULT_STACK_SIZE }
    }

    /// Caps the logged stack trace at `bytes`.
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = bytes;
        self
    }
}

impl Default for Recover {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for Recover {
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        let stack_size = self.stack_size;
        Box::pin(async move {
            match (CatchUnwind { inner: next.run(req) }).await {
                Ok(res) => res,
                Err((payload, stack)) => {
                    log_panic(&Recovered::new(&*payload, stack, stack_size));
                    HttpError::from(StatusCode::INTERNAL_SERVER_ERROR).into_response()
                }
            }
        })
    }
}
