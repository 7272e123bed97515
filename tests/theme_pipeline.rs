use std::cell::RefCell;
use std::rc::Rc;

use log::{Level, LevelFilter, Log, Metadata, Record};
use once_cell::sync::Lazy;

use globe_viewer::render::{ManualScheduler, TextureUnit};
use globe_viewer::theme::{CommitOutcome, LoadState};
use globe_viewer::{
    DecodedImage, MemoryAssetSource, RecordingBackend, ThemeLoader, Viewer, ViewerConfig,
};

thread_local! {
    static RECORDS: RefCell<Vec<(Level, String)>> = const { RefCell::new(Vec::new()) };
}

/// Keeps the records of each test thread apart so parallel tests can count
/// their own errors.
struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        RECORDS.with(|records| {
            records
                .borrow_mut()
                .push((record.level(), record.args().to_string()));
        });
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;
static INIT_LOGGER: Lazy<()> = Lazy::new(|| {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }
});

fn capture_logs() {
    Lazy::force(&INIT_LOGGER);
    RECORDS.with(|records| records.borrow_mut().clear());
}

fn errors() -> Vec<String> {
    RECORDS.with(|records| {
        records
            .borrow()
            .iter()
            .filter(|(level, _)| *level == Level::Error)
            .map(|(_, message)| message.clone())
            .collect()
    })
}

fn descriptor(prefix: &str) -> String {
    format!(
        r#"{{
            "light": {{ "color": [1, 1, 1], "intensity": 1.5 }},
            "material": {{
                "ambientIntensity": 0.1, "specularity": 32,
                "specularIntensity": 0.5, "normalMapScale": 1,
                "textures": {{
                    "diffuse": "{prefix}-d.png",
                    "normal": "{prefix}-n.png",
                    "specular": "{prefix}-s.png"
                }}
            }}
        }}"#
    )
}

fn with_theme(
    source: MemoryAssetSource,
    name: &str,
    prefix: &str,
    size: u32,
) -> MemoryAssetSource {
    source
        .with_text(format!("themes/{name}.json"), descriptor(prefix))
        .with_image(
            format!("img/{prefix}-d.png"),
            DecodedImage::solid(size, size, [10, 20, 30, 255]),
        )
        .with_image(
            format!("img/{prefix}-n.png"),
            DecodedImage::solid(size, size, [128, 128, 255, 255]),
        )
        .with_image(
            format!("img/{prefix}-s.png"),
            DecodedImage::solid(size, size, [90, 90, 90, 255]),
        )
}

type TestViewer = Viewer<RecordingBackend, ManualScheduler>;

fn setup(source: MemoryAssetSource) -> (Rc<MemoryAssetSource>, ThemeLoader, TestViewer) {
    let mut config = ViewerConfig::default();
    config.mesh.vertical = 6;
    config.mesh.horizontal = 8;
    let source = Rc::new(source);
    let loader = ThemeLoader::new(source.clone());
    let viewer = Viewer::new(RecordingBackend::new(), ManualScheduler::default(), &config)
        .expect("viewer");
    (source, loader, viewer)
}

#[test]
fn selected_theme_is_fetched_uploaded_and_drawn() {
    capture_logs();
    let source = with_theme(MemoryAssetSource::new(), "realistic-day", "day", 4);
    let (source, mut loader, mut viewer) = setup(source);

    viewer
        .load_theme("realistic-day", &mut loader)
        .expect("spawn load");
    assert!(viewer.ui().loading_indicator);
    assert!(!viewer.ui().surface_visible);

    let outcomes = viewer.pump(&mut loader);
    assert_eq!(outcomes, vec![CommitOutcome::Activated]);
    assert_eq!(
        source.requests(),
        vec![
            "themes/realistic-day.json",
            "img/day-d.png",
            "img/day-n.png",
            "img/day-s.png",
        ]
    );
    assert!(!viewer.ui().loading_indicator);
    assert!(viewer.ui().surface_visible);
    assert_eq!(viewer.themes.state(), LoadState::Ready);
    assert_eq!(viewer.backend.live_textures().len(), 3);

    assert!(viewer.frame(0.0).expect("frame"));
    assert!(viewer.frame(1.0 / 60.0).expect("frame"));
    assert_eq!(viewer.backend.draw_count(), 2);
    assert_eq!(viewer.backend.last_draw(), Some(6 * 6 * 8));

    let active = viewer.themes.active().expect("active theme");
    for unit in TextureUnit::ALL {
        assert_eq!(
            viewer.backend.bound_texture(unit),
            Some(active.textures.get(unit))
        );
    }
    assert!(errors().is_empty());
}

#[test]
fn failed_image_logs_one_error_and_keeps_the_previous_theme() {
    capture_logs();
    let source = with_theme(MemoryAssetSource::new(), "realistic-day", "day", 4);
    let source = with_theme(source, "realistic-night", "night", 4)
        .with_failure("img/night-s.png", "connection reset");
    let (_source, mut loader, mut viewer) = setup(source);

    viewer.load_theme("realistic-day", &mut loader).unwrap();
    viewer.pump(&mut loader);
    let day = viewer.themes.active().unwrap().textures;

    viewer.load_theme("realistic-night", &mut loader).unwrap();
    assert_eq!(viewer.pump(&mut loader), vec![CommitOutcome::Failed]);

    let errors = errors();
    assert_eq!(errors.len(), 1, "errors: {errors:?}");
    assert!(errors[0].contains("realistic-night"));
    assert!(errors[0].contains("img/night-s.png"));

    let active = viewer.themes.active().unwrap();
    assert_eq!(active.name, "realistic-day");
    assert_eq!(active.textures, day);
    assert_eq!(viewer.themes.state(), LoadState::Failed);
    assert!(!viewer.ui().loading_indicator);
    assert_eq!(viewer.backend.live_textures().len(), 3);
    assert!(viewer.frame(0.0).unwrap());
}

#[test]
fn failure_before_any_theme_leaves_the_indicator_up() {
    capture_logs();
    let source = MemoryAssetSource::new().with_failure("themes/realistic-day.json", "404");
    let (_source, mut loader, mut viewer) = setup(source);

    viewer.load_theme("realistic-day", &mut loader).unwrap();
    assert_eq!(viewer.pump(&mut loader), vec![CommitOutcome::Failed]);
    assert_eq!(errors().len(), 1);
    assert!(viewer.ui().loading_indicator);
    assert!(!viewer.ui().surface_visible);
    assert!(viewer.backend.live_textures().is_empty());
    assert!(!viewer.render_loop.is_running());
}

#[test]
fn later_request_wins_when_the_earlier_one_resolves_last() {
    capture_logs();
    let source = with_theme(MemoryAssetSource::new(), "abstract-blue", "blue", 2);
    let source = with_theme(source, "abstract-blue2", "blue2", 4);
    let (source, mut loader, mut viewer) = setup(source);

    let first_gate = source.hold("themes/abstract-blue.json");
    viewer.load_theme("abstract-blue", &mut loader).unwrap();
    assert!(viewer.pump(&mut loader).is_empty());
    assert_eq!(loader.in_flight(), 1);

    viewer.load_theme("abstract-blue2", &mut loader).unwrap();
    assert_eq!(viewer.pump(&mut loader), vec![CommitOutcome::Activated]);
    let winner = viewer.themes.active().unwrap().textures;

    first_gate.release();
    assert_eq!(viewer.pump(&mut loader), vec![CommitOutcome::Discarded]);
    assert_eq!(loader.in_flight(), 0);

    let active = viewer.themes.active().unwrap();
    assert_eq!(active.name, "abstract-blue2");
    assert_eq!(active.textures, winner);
    let live = viewer.backend.live_textures();
    assert_eq!(live.len(), 3);
    assert!(live.values().all(|info| info.width == 4));
    assert!(viewer.backend.released_textures().is_empty());
    assert!(errors().is_empty());
}

#[test]
fn switching_themes_releases_the_previous_textures() {
    capture_logs();
    let source = with_theme(MemoryAssetSource::new(), "realistic-day", "day", 2);
    let source = with_theme(source, "realistic-night", "night", 4);
    let (_source, mut loader, mut viewer) = setup(source);

    viewer.load_theme("realistic-day", &mut loader).unwrap();
    viewer.pump(&mut loader);
    let day = viewer.themes.active().unwrap().textures.handles();

    viewer.load_theme("realistic-night", &mut loader).unwrap();
    viewer.pump(&mut loader);
    assert_eq!(viewer.backend.released_textures(), &day);
    assert_eq!(viewer.backend.live_textures().len(), 3);
    assert_eq!(viewer.render_loop.scheduler().requested(), 1);
    assert_eq!(viewer.backend.programs().len(), 1);
    assert!(viewer.frame(0.0).unwrap());
    assert_eq!(viewer.backend.programs(), &[viewer.scene.program]);

    viewer.shutdown();
    assert!(viewer.backend.live_textures().is_empty());
}

#[test]
fn earlier_request_is_discarded_even_when_it_resolves_first() {
    capture_logs();
    let source = with_theme(MemoryAssetSource::new(), "abstract-blue", "blue", 2);
    let source = with_theme(source, "abstract-blue2", "blue2", 4);
    let (source, mut loader, mut viewer) = setup(source);

    let first_gate = source.hold("img/blue-n.png");
    let second_gate = source.hold("themes/abstract-blue2.json");
    viewer.load_theme("abstract-blue", &mut loader).unwrap();
    viewer.load_theme("abstract-blue2", &mut loader).unwrap();
    assert!(viewer.pump(&mut loader).is_empty());

    first_gate.release();
    assert_eq!(viewer.pump(&mut loader), vec![CommitOutcome::Discarded]);
    assert!(viewer.themes.active().is_none());
    assert!(viewer.ui().loading_indicator);
    assert!(viewer.backend.live_textures().is_empty());

    second_gate.release();
    assert_eq!(viewer.pump(&mut loader), vec![CommitOutcome::Activated]);
    assert_eq!(viewer.themes.active().unwrap().name, "abstract-blue2");
    assert_eq!(viewer.backend.live_textures().len(), 3);
}
