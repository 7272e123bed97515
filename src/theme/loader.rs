use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use futures::executor::{LocalPool, LocalSpawner};
use futures::future;
use futures::task::LocalSpawnExt;

use super::descriptor::{descriptor_path, ThemeDescriptor};
use super::manager::{LoadedTheme, ThemeLoad, ThemeRequest};
use crate::assets::AssetSource;
use crate::error::Result;

/// Fetches the descriptor of `request`, then its three images concurrently.
/// The first failing image fails the whole load.
pub async fn fetch_theme(source: Rc<dyn AssetSource>, request: ThemeRequest) -> ThemeLoad {
    let result = fetch_assets(source.as_ref(), &request.name).await;
    ThemeLoad { request, result }
}

async fn fetch_assets(source: &dyn AssetSource, name: &str) -> Result<LoadedTheme> {
    let text = source.fetch_text(&descriptor_path(name)).await?;
    let descriptor = ThemeDescriptor::from_json(name, &text)?;
    let [diffuse, normal, specular] = descriptor.image_paths();
    let images = future::try_join3(
        source.fetch_image(&diffuse),
        source.fetch_image(&normal),
        source.fetch_image(&specular),
    )
    .await?;
    Ok(LoadedTheme {
        descriptor,
        images: [images.0, images.1, images.2],
    })
}

/// Runs theme fetches on a single-threaded executor and collects the
/// finished loads in arrival order.
pub struct ThemeLoader {
    pool: LocalPool,
    spawner: LocalSpawner,
    source: Rc<dyn AssetSource>,
    inbox: Rc<RefCell<VecDeque<ThemeLoad>>>,
    in_flight: usize,
}

impl ThemeLoader {
    pub fn new(source: Rc<dyn AssetSource>) -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self {
            pool,
            spawner,
            source,
            inbox: Rc::default(),
            in_flight: 0,
        }
    }

    pub fn source(&self) -> &Rc<dyn AssetSource> {
        &self.source
    }

    /// Number of spawned loads that have not been handed out yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn spawn(&mut self, request: ThemeRequest) -> Result<()> {
        let inbox = Rc::clone(&self.inbox);
        let fetch = fetch_theme(Rc::clone(&self.source), request);
        self.spawner.spawn_local(async move {
            let load = fetch.await;
            inbox.borrow_mut().push_back(load);
        })?;
        self.in_flight += 1;
        Ok(())
    }

    /// Drives every fetch as far as it can go without blocking and returns
    /// the loads that finished.
    pub fn poll(&mut self) -> Vec<ThemeLoad> {
        self.pool.run_until_stalled();
        self.take_finished()
    }

    /// Blocks until every spawned fetch has finished.
    pub fn wait(&mut self) -> Vec<ThemeLoad> {
        self.pool.run();
        self.take_finished()
    }

    fn take_finished(&mut self) -> Vec<ThemeLoad> {
        let finished: Vec<_> = self.inbox.borrow_mut().drain(..).collect();
        self.in_flight -= finished.len();
        finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{DecodedImage, MemoryAssetSource};
    use crate::error::ViewerError;

    const THEME: &str = r#"{
        "light": { "color": [1, 1, 1], "intensity": 1 },
        "material": {
            "ambientIntensity": 0.2, "specularity": 10,
            "specularIntensity": 0.4, "normalMapScale": 0.5,
            "textures": { "diffuse": "d.png", "normal": "n.png", "specular": "s.png" }
        }
    }"#;

    fn source() -> MemoryAssetSource {
        let pixel = || DecodedImage::solid(1, 1, [255, 255, 255, 255]);
        MemoryAssetSource::new()
            .with_text("themes/day.json", THEME)
            .with_image("img/d.png", pixel())
            .with_image("img/n.png", pixel())
            .with_image("img/s.png", pixel())
    }

    fn request(name: &str) -> ThemeRequest {
        ThemeRequest {
            generation: 1,
            name: name.to_string(),
        }
    }

    #[test]
    fn loads_descriptor_then_images() {
        let source = Rc::new(source());
        let mut loader = ThemeLoader::new(source.clone());
        loader.spawn(request("day")).unwrap();
        assert_eq!(loader.in_flight(), 1);

        let loads = loader.wait();
        assert_eq!(loads.len(), 1);
        let loaded = loads[0].result.as_ref().unwrap();
        assert_eq!(loaded.descriptor.material.normal_map_scale, 0.5);
        assert_eq!(loader.in_flight(), 0);
        assert_eq!(
            source.requests(),
            vec!["themes/day.json", "img/d.png", "img/n.png", "img/s.png"]
        );
    }

    #[test]
    fn one_failing_image_fails_the_load() {
        let source = Rc::new(source().with_failure("img/s.png", "404"));
        let mut loader = ThemeLoader::new(source);
        loader.spawn(request("day")).unwrap();
        let loads = loader.wait();
        assert!(matches!(
            loads[0].result,
            Err(ViewerError::AssetLoad { ref path, .. }) if path == "img/s.png"
        ));
    }

    #[test]
    fn gated_loads_stay_in_flight() {
        let source = Rc::new(source());
        let gate = source.hold("img/n.png");
        let mut loader = ThemeLoader::new(source.clone());
        loader.spawn(request("day")).unwrap();

        assert!(loader.poll().is_empty());
        assert_eq!(loader.in_flight(), 1);

        gate.release();
        assert_eq!(loader.poll().len(), 1);
    }

    #[test]
    fn missing_descriptor_is_reported() {
        let mut loader = ThemeLoader::new(Rc::new(MemoryAssetSource::new()));
        loader.spawn(request("night")).unwrap();
        let loads = loader.wait();
        assert!(loads[0].result.is_err());
        assert_eq!(loads[0].request.name, "night");
    }
}
