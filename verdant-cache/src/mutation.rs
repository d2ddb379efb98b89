use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::watch;
use verdant_core::ClientError;

use crate::state::{FetchStatus, MutationState};

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type MutateFn<P, R> = Arc<dyn Fn(P) -> BoxFuture<Result<R, ClientError>> + Send + Sync>;
type ValidateFn<P> = Arc<dyn Fn(&P) -> Result<(), ClientError> + Send + Sync>;
type SuccessFn<R> = Arc<dyn Fn(Arc<R>) -> BoxFuture<()> + Send + Sync>;
type ErrorFn = Arc<dyn Fn(ClientError) -> BoxFuture<()> + Send + Sync>;

struct MutationInner<P, R> {
    name: &'static str,
    mutate: MutateFn<P, R>,
    validate: Option<ValidateFn<P>>,
    on_success: Vec<SuccessFn<R>>,
    on_error: Vec<ErrorFn>,
    state: watch::Sender<MutationState<R>>,
}

/// A single write operation with its own `Idle -> Pending -> Success | Failure`
/// state.
///
/// Every [`execute`](Mutation::execute) is independent: nothing is coalesced
/// or retried, and concurrent executions are not serialized (the state shows
/// whichever finished last). Callbacks are awaited before `execute` returns.
pub struct Mutation<P, R> {
    inner: Arc<MutationInner<P, R>>,
}

impl<P, R> Clone for Mutation<P, R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P, R> Mutation<P, R>
where
    P: Send + 'static,
    R: Send + Sync + 'static,
{
    pub fn new<F, Fut>(mutate: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ClientError>> + Send + 'static,
    {
        let (state, _) = watch::channel(MutationState::idle());
        Self {
            inner: Arc::new(MutationInner {
                name: "mutation",
                mutate: Arc::new(move |payload| -> BoxFuture<Result<R, ClientError>> {
                    Box::pin(mutate(payload))
                }),
                validate: None,
                on_success: Vec::new(),
                on_error: Vec::new(),
                state,
            }),
        }
    }

    fn configure(self, apply: impl FnOnce(&mut MutationInner<P, R>)) -> Self {
        match Arc::try_unwrap(self.inner) {
            Ok(mut inner) => {
                apply(&mut inner);
                Self {
                    inner: Arc::new(inner),
                }
            }
            Err(shared) => {
                tracing::warn!(mutation = shared.name, "mutation already shared, configuration ignored");
                Self { inner: shared }
            }
        }
    }

    /// Name used in logs.
    pub fn named(self, name: &'static str) -> Self {
        self.configure(|inner| inner.name = name)
    }

    /// Reject payloads before any request is made. A rejected payload leaves
    /// the state untouched and does not trigger `on_error`.
    pub fn validate_with<F>(self, validate: F) -> Self
    where
        F: Fn(&P) -> Result<(), ClientError> + Send + Sync + 'static,
    {
        self.configure(|inner| inner.validate = Some(Arc::new(validate)))
    }

    pub fn on_success<F, Fut>(self, callback: F) -> Self
    where
        F: Fn(Arc<R>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.configure(|inner| {
            inner
                .on_success
                .push(Arc::new(move |value| -> BoxFuture<()> { Box::pin(callback(value)) }))
        })
    }

    pub fn on_error<F, Fut>(self, callback: F) -> Self
    where
        F: Fn(ClientError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.configure(|inner| {
            inner
                .on_error
                .push(Arc::new(move |error| -> BoxFuture<()> { Box::pin(callback(error)) }))
        })
    }

    /// Run the mutation once with `payload`.
    pub async fn execute(&self, payload: P) -> Result<Arc<R>, ClientError> {
        let inner = &self.inner;
        if let Some(validate) = &inner.validate {
            if let Err(error) = validate(&payload) {
                tracing::debug!(mutation = inner.name, error = %error, "payload rejected");
                return Err(error);
            }
        }

        inner.state.send_modify(|state| {
            state.status = FetchStatus::Pending;
            state.error = None;
        });
        tracing::debug!(mutation = inner.name, "mutation started");

        match (inner.mutate)(payload).await {
            Ok(value) => {
                let value = Arc::new(value);
                inner.state.send_replace(MutationState {
                    status: FetchStatus::Success,
                    data: Some(value.clone()),
                    error: None,
                });
                tracing::debug!(mutation = inner.name, "mutation succeeded");
                for callback in &inner.on_success {
                    callback(value.clone()).await;
                }
                Ok(value)
            }
            Err(error) => {
                inner.state.send_modify(|state| {
                    state.status = FetchStatus::Failure;
                    state.error = Some(error.clone());
                });
                tracing::warn!(mutation = inner.name, error = %error, "mutation failed");
                for callback in &inner.on_error {
                    callback(error.clone()).await;
                }
                Err(error)
            }
        }
    }

    pub fn state(&self) -> MutationState<R> {
        self.inner.state.borrow().clone()
    }

    pub fn is_pending(&self) -> bool {
        self.inner.state.borrow().is_pending()
    }

    pub fn is_error(&self) -> bool {
        self.inner.state.borrow().is_error()
    }

    pub fn watch(&self) -> watch::Receiver<MutationState<R>> {
        self.inner.state.subscribe()
    }

    /// Return to `Idle`, forgetting the last result.
    pub fn reset(&self) {
        self.inner.state.send_replace(MutationState::idle());
    }
}
