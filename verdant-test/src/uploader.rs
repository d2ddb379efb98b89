use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use verdant_core::ClientError;
use verdant_http::{ImageFile, ImageUploader, UploadFuture};

enum Behavior {
    Succeed(String),
    Fail(ClientError),
    Gated(Option<oneshot::Receiver<Result<String, ClientError>>>),
}

/// In-memory [`ImageUploader`] recording the files it receives.
pub struct MockUploader {
    behavior: Mutex<Behavior>,
    uploads: Mutex<Vec<ImageFile>>,
}

impl MockUploader {
    /// Every upload succeeds with `url`.
    pub fn succeeding(url: impl Into<String>) -> Arc<Self> {
        Self::with(Behavior::Succeed(url.into()))
    }

    /// Every upload fails with `error`.
    pub fn failing(error: ClientError) -> Arc<Self> {
        Self::with(Behavior::Fail(error))
    }

    /// The first upload waits until the returned sender provides its result.
    pub fn gated() -> (Arc<Self>, oneshot::Sender<Result<String, ClientError>>) {
        let (tx, rx) = oneshot::channel();
        (Self::with(Behavior::Gated(Some(rx))), tx)
    }

    fn with(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior: Mutex::new(behavior),
            uploads: Mutex::new(Vec::new()),
        })
    }

    pub fn uploads(&self) -> Vec<ImageFile> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

impl ImageUploader for MockUploader {
    fn upload(&self, image: ImageFile) -> UploadFuture<'_> {
        self.uploads.lock().unwrap().push(image);
        let mut behavior = self.behavior.lock().unwrap();
        match &mut *behavior {
            Behavior::Succeed(url) => {
                let url = url.clone();
                Box::pin(async move { Ok(url) })
            }
            Behavior::Fail(error) => {
                let error = error.clone();
                Box::pin(async move { Err(error) })
            }
            Behavior::Gated(rx) => {
                let rx = rx.take();
                Box::pin(async move {
                    match rx {
                        Some(rx) => rx
                            .await
                            .unwrap_or_else(|_| Err(ClientError::Transport("upload gate dropped".into()))),
                        None => Err(ClientError::Transport("upload gate already used".into())),
                    }
                })
            }
        }
    }
}
