use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use futures::channel::oneshot;
use futures::future::{FutureExt, LocalBoxFuture};

use super::{AssetSource, DecodedImage};
use crate::error::{Result, ViewerError};

#[derive(Debug, Default)]
struct Entries {
    texts: HashMap<String, String>,
    images: HashMap<String, Arc<DecodedImage>>,
    failures: HashMap<String, String>,
    gates: HashMap<String, oneshot::Receiver<()>>,
    requests: Vec<String>,
}

/// Holds a gated fetch until [`Gate::release`] is called. Dropping the gate
/// fails the fetch instead.
#[derive(Debug)]
pub struct Gate {
    path: String,
    sender: oneshot::Sender<()>,
}

impl Gate {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn release(self) {
        let _ = self.sender.send(());
    }
}

/// In-memory assets for tests and embedding. Responses can be held back with
/// [`MemoryAssetSource::hold`] to control the order in which fetches resolve.
#[derive(Debug, Default)]
pub struct MemoryAssetSource {
    entries: RefCell<Entries>,
}

impl MemoryAssetSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(self, path: impl Into<String>, text: impl Into<String>) -> Self {
        self.entries.borrow_mut().texts.insert(path.into(), text.into());
        self
    }

    pub fn with_image(self, path: impl Into<String>, image: DecodedImage) -> Self {
        self.entries
            .borrow_mut()
            .images
            .insert(path.into(), Arc::new(image));
        self
    }

    /// Makes every fetch of `path` fail with `reason`.
    pub fn with_failure(self, path: impl Into<String>, reason: impl Into<String>) -> Self {
        self.entries
            .borrow_mut()
            .failures
            .insert(path.into(), reason.into());
        self
    }

    /// Holds the next fetch of `path` until the returned gate is released.
    pub fn hold(&self, path: impl Into<String>) -> Gate {
        let path = path.into();
        let (sender, receiver) = oneshot::channel();
        self.entries.borrow_mut().gates.insert(path.clone(), receiver);
        Gate { path, sender }
    }

    /// Paths fetched so far, in request order.
    pub fn requests(&self) -> Vec<String> {
        self.entries.borrow().requests.clone()
    }

    fn respond<T: 'static>(
        &self,
        path: &str,
        lookup: impl FnOnce(&Entries) -> Option<T>,
    ) -> LocalBoxFuture<'static, Result<T>> {
        let mut entries = self.entries.borrow_mut();
        entries.requests.push(path.to_string());
        let gate = entries.gates.remove(path);
        let result = match entries.failures.get(path) {
            Some(reason) => Err(ViewerError::asset(path, reason)),
            None => lookup(&*entries).ok_or_else(|| ViewerError::asset(path, "not found")),
        };
        let path = path.to_string();
        async move {
            if let Some(gate) = gate {
                gate.await
                    .map_err(|_| ViewerError::asset(&path, "request aborted"))?;
            }
            result
        }
        .boxed_local()
    }
}

impl AssetSource for MemoryAssetSource {
    fn fetch_text(&self, path: &str) -> LocalBoxFuture<'static, Result<String>> {
        self.respond(path, |entries| entries.texts.get(path).cloned())
    }

    fn fetch_image(&self, path: &str) -> LocalBoxFuture<'static, Result<Arc<DecodedImage>>> {
        self.respond(path, |entries| entries.images.get(path).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use futures::task::noop_waker_ref;
    use std::task::{Context, Poll};

    #[test]
    fn serves_registered_entries() {
        let source = MemoryAssetSource::new()
            .with_text("themes/day.json", "{}")
            .with_image("img/d.png", DecodedImage::solid(2, 2, [1, 1, 1, 255]));
        assert_eq!(block_on(source.fetch_text("themes/day.json")).unwrap(), "{}");
        assert_eq!(block_on(source.fetch_image("img/d.png")).unwrap().width(), 2);
        assert!(block_on(source.fetch_text("themes/night.json")).is_err());
        assert_eq!(
            source.requests(),
            vec!["themes/day.json", "img/d.png", "themes/night.json"]
        );
    }

    #[test]
    fn failures_override_entries() {
        let source = MemoryAssetSource::new()
            .with_text("themes/day.json", "{}")
            .with_failure("themes/day.json", "503");
        let err = block_on(source.fetch_text("themes/day.json")).unwrap_err();
        assert_eq!(err.to_string(), "failed to load asset themes/day.json: 503");
    }

    #[test]
    fn gated_fetches_wait_for_release() {
        let source = MemoryAssetSource::new().with_text("a.json", "a");
        let gate = source.hold("a.json");
        let mut fetch = source.fetch_text("a.json");

        let mut cx = Context::from_waker(noop_waker_ref());
        assert!(fetch.poll_unpin(&mut cx).is_pending());
        gate.release();
        assert!(matches!(fetch.poll_unpin(&mut cx), Poll::Ready(Ok(ref text)) if text == "a"));
    }

    #[test]
    fn dropped_gate_fails_the_fetch() {
        let source = MemoryAssetSource::new().with_text("a.json", "a");
        drop(source.hold("a.json"));
        assert!(block_on(source.fetch_text("a.json")).is_err());
    }
}
