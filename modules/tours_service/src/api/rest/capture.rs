//! Bridging fallible handlers into the global responder
//!
//! A handler's failure is converted into `Failure` exactly once and parked in
//! the response; nothing here formats an error body.

use crate::contract::Failure;
use axum::response::{IntoResponse, Response};
use futures::future::BoxFuture;
use std::future::Future;

/// Await an already-invoked handler and hand any failure to the responder
pub async fn capture<Fut, T, E>(future: Fut) -> Response
where
    Fut: Future<Output = Result<T, E>>,
    T: IntoResponse,
    E: Into<Failure>,
{
    match future.await {
        Ok(value) => value.into_response(),
        Err(err) => err.into().into_response(),
    }
}

/// Wrap a single-argument handler so its failure is captured
///
/// The wrapper holds no state of its own and calls `handler` once per request.
pub fn with_failure_capture<A, F, Fut, T, E>(
    handler: F,
) -> impl Fn(A) -> BoxFuture<'static, Response> + Clone + Send + Sync + 'static
where
    A: Send + 'static,
    F: Fn(A) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: IntoResponse + 'static,
    E: Into<Failure> + 'static,
{
    move |arg| {
        let future = handler(arg);
        Box::pin(capture(future))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::rest::error::CapturedFailure;
    use crate::contract::AppError;
    use axum::http::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn success_passes_through() {
        let response = capture(async { Ok::<_, AppError>((StatusCode::CREATED, "made")) }).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.extensions().get::<CapturedFailure>().is_none());
    }

    #[tokio::test]
    async fn failure_is_parked_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = {
            let calls = calls.clone();
            move |id: u32| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(AppError::not_found(format!("No tour {id}")))
                }
            }
        };
        let wrapped = with_failure_capture(handler);

        let response = wrapped(7).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let CapturedFailure(failure) = response
            .extensions()
            .get::<CapturedFailure>()
            .cloned()
            .unwrap();
        assert_eq!(failure.status_code(), Some(404));
        assert_eq!(failure.message(), "No tour 7");
    }
}
