use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::sync::Once;

use axum::{
    http::{header::CONNECTION, HeaderValue, StatusCode},
    response::Response,
};

use crate::error::status_response;
use crate::metrics::Metrics;

thread_local! {
    static LAST_BACKTRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static INSTALL_HOOK: Once = Once::new();

/// Chains a panic hook that records the panicking thread's backtrace.
/// `CatchPanicLayer` calls the handler on that same thread, right after
/// unwinding, so the handler can pick the trace up.
pub fn install_panic_hook() {
    INSTALL_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let trace = Backtrace::force_capture().to_string();
            LAST_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

/// Takes the backtrace recorded by the most recent panic on this thread.
pub fn take_backtrace() -> Option<String> {
    LAST_BACKTRACE.with(|slot| slot.borrow_mut().take())
}

/// Builds the handler for `CatchPanicLayer::custom`: the panic is logged with
/// its backtrace and counted, and the client gets a 500 with `Connection: close`.
pub fn panic_handler(metrics: Metrics) -> impl Fn(Box<dyn Any + Send + 'static>) -> Response + Clone + Send + Sync + 'static {
    install_panic_hook();
    move |payload: Box<dyn Any + Send + 'static>| {
        let detail = if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else {
            "unknown panic payload".to_string()
        };
        let backtrace = take_backtrace().unwrap_or_else(|| "unavailable".to_string());
        metrics.inc_panics_recovered();
        tracing::error!(panic = %detail, backtrace = %backtrace, "handler panicked");

        let mut res = status_response(StatusCode::INTERNAL_SERVER_ERROR);
        res.headers_mut().insert(CONNECTION, HeaderValue::from_static("close"));
        res
    }
}
