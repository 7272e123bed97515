use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use futures::channel::oneshot;
use futures::future::{self, FutureExt, LocalBoxFuture};
use log::debug;
use parking_lot::RwLock;

use super::{validate_path, AssetSource, DecodedImage};
use crate::error::{Result, ViewerError};

/// Decoded images kept by a source: one theme's diffuse, normal and specular
/// maps.
pub const CACHED_IMAGES: usize = 3;

/// Most recently decoded images, oldest first.
#[derive(Debug, Default)]
struct ImageCache {
    entries: VecDeque<(String, Arc<DecodedImage>)>,
}

impl ImageCache {
    fn get(&self, path: &str) -> Option<Arc<DecodedImage>> {
        self.entries
            .iter()
            .find(|(cached, _)| cached == path)
            .map(|(_, image)| Arc::clone(image))
    }

    fn insert(&mut self, path: String, image: Arc<DecodedImage>) {
        self.entries.retain(|(cached, _)| *cached != path);
        self.entries.push_back((path, image));
        while self.entries.len() > CACHED_IMAGES {
            if let Some((evicted, _)) = self.entries.pop_front() {
                debug!("evicted {evicted} from the image cache");
            }
        }
    }
}

/// Reads assets from a directory. Each fetch runs its blocking read (and
/// decode, for images) on a short-lived worker thread. The last
/// [`CACHED_IMAGES`] decoded images are kept for reuse.
#[derive(Debug, Clone)]
pub struct FileAssetSource {
    root: PathBuf,
    images: Arc<RwLock<ImageCache>>,
}

impl FileAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            images: Arc::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cached_images(&self) -> usize {
        self.images.read().entries.len()
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        validate_path(path)?;
        Ok(path
            .split('/')
            .filter(|segment| !segment.is_empty() && *segment != ".")
            .fold(self.root.clone(), |full, segment| full.join(segment)))
    }
}

impl AssetSource for FileAssetSource {
    fn fetch_text(&self, path: &str) -> LocalBoxFuture<'static, Result<String>> {
        let full = match self.resolve(path) {
            Ok(full) => full,
            Err(err) => return future::ready(Err(err)).boxed_local(),
        };
        let name = path.to_string();
        spawn_worker(name.clone(), move || {
            fs::read_to_string(&full).map_err(|err| ViewerError::asset(&name, err))
        })
    }

    fn fetch_image(&self, path: &str) -> LocalBoxFuture<'static, Result<Arc<DecodedImage>>> {
        if let Some(image) = self.images.read().get(path) {
            debug!("image cache hit for {path}");
            return future::ready(Ok(image)).boxed_local();
        }
        let full = match self.resolve(path) {
            Ok(full) => full,
            Err(err) => return future::ready(Err(err)).boxed_local(),
        };
        let name = path.to_string();
        let cache = Arc::clone(&self.images);
        spawn_worker(name.clone(), move || {
            let bytes = fs::read(&full).map_err(|err| ViewerError::asset(&name, err))?;
            let image = Arc::new(DecodedImage::from_encoded(&name, &bytes)?);
            cache.write().insert(name, Arc::clone(&image));
            Ok(image)
        })
    }
}

fn spawn_worker<T, F>(path: String, work: F) -> LocalBoxFuture<'static, Result<T>>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let (sender, receiver) = oneshot::channel();
    let spawned = thread::Builder::new()
        .name(format!("asset:{path}"))
        .spawn(move || {
            let _ = sender.send(work());
        });
    if let Err(err) = spawned {
        return future::ready(Err(ViewerError::asset(path, err))).boxed_local();
    }
    async move {
        receiver
            .await
            .unwrap_or_else(|_| Err(ViewerError::asset(path, "worker exited without a result")))
    }
    .boxed_local()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use image::{Rgba, RgbaImage};

    fn write_png(dir: &Path, name: &str) {
        let image = RgbaImage::from_pixel(4, 4, Rgba([0, 128, 255, 255]));
        image.save(dir.join(name)).unwrap();
    }

    #[test]
    fn reads_text_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("themes")).unwrap();
        fs::write(dir.path().join("themes/day.json"), "{}").unwrap();

        let source = FileAssetSource::new(dir.path());
        assert_eq!(block_on(source.fetch_text("themes/day.json")).unwrap(), "{}");
    }

    #[test]
    fn missing_files_are_asset_errors() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileAssetSource::new(dir.path());
        let err = block_on(source.fetch_text("themes/none.json")).unwrap_err();
        assert!(matches!(
            err,
            ViewerError::AssetLoad { ref path, .. } if path == "themes/none.json"
        ));
    }

    #[test]
    fn decoded_images_are_cached() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "blue.png");

        let source = FileAssetSource::new(dir.path());
        let first = block_on(source.fetch_image("blue.png")).unwrap();
        assert_eq!(source.cached_images(), 1);
        let second = block_on(source.fetch_image("blue.png")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.width(), 4);
    }

    #[test]
    fn cache_keeps_only_the_latest_images() {
        let dir = tempfile::tempdir().unwrap();
        let names = ["a.png", "b.png", "c.png", "d.png"];
        for name in names {
            write_png(dir.path(), name);
        }

        let source = FileAssetSource::new(dir.path());
        for name in names {
            block_on(source.fetch_image(name)).unwrap();
        }
        assert_eq!(source.cached_images(), CACHED_IMAGES);

        for name in names {
            fs::remove_file(dir.path().join(name)).unwrap();
        }
        assert!(block_on(source.fetch_image("a.png")).is_err());
        assert!(block_on(source.fetch_image("d.png")).is_ok());
        assert_eq!(source.cached_images(), CACHED_IMAGES);
    }

    #[test]
    fn traversal_never_reaches_the_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileAssetSource::new(dir.path().join("assets"));
        assert!(block_on(source.fetch_text("../outside.json")).is_err());
    }
}
