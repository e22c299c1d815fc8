//! End-to-end pipeline runs against mocked sites and a temporary asset
//! directory.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use iconvault::{
    BatchItem, ConversionRequest, IconError, IconPipeline, IconReference, ItemState,
    PipelineConfig, ResolveMode, Theme, TransformKind,
};
use iconvault_render::IconImage;
use iconvault_render::image::{Rgba, RgbaImage};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const ICO_MAGIC: &[u8] = &[0, 0, 1, 0, 1, 0, 16, 16, 0, 0];

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("iconvault=debug,iconvault_net=debug")
        .try_init();
}

/// An opaque 8x8 icon: white field, dark 2x2 mark in the middle.
fn glyph_png() -> Vec<u8> {
    let img = RgbaImage::from_fn(8, 8, |x, y| {
        if (3..5).contains(&x) && (3..5).contains(&y) {
            Rgba([20, 30, 40, 255])
        } else {
            Rgba([250, 250, 250, 255])
        }
    });
    IconImage::from_rgba_image(img).unwrap().to_png().unwrap()
}

fn config(dir: &TempDir) -> PipelineConfig {
    PipelineConfig::new(dir.path().join("favicons"))
        .with_fetch_timeout(Duration::from_millis(500))
        .with_connect_timeout(Duration::from_millis(500))
        .with_max_concurrency(3)
}

fn pipeline(dir: &TempDir) -> IconPipeline {
    init_tracing();
    IconPipeline::new(config(dir)).expect("pipeline")
}

async fn site_with_png(png: &[u8]) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(r#"<html><head><link rel="icon" href="/icon.png"></head></html>"#),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/icon.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(png.to_vec()),
        )
        .mount(&server)
        .await;
    server
}

async fn site_with_ico(delay: Option<Duration>) -> MockServer {
    let server = MockServer::start().await;
    let mut response = ResponseTemplate::new(200)
        .insert_header("content-type", "image/x-icon")
        .set_body_bytes(ICO_MAGIC.to_vec());
    let mut root = ResponseTemplate::new(404);
    if let Some(delay) = delay {
        response = response.set_delay(delay);
        root = root.set_delay(delay);
    }
    Mock::given(method("GET"))
        .and(path("/favicon.ico"))
        .respond_with(response)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(root)
        .mount(&server)
        .await;
    server
}

fn seed(dir: &TempDir, name: &str, bytes: &[u8]) {
    let root = dir.path().join("favicons");
    std::fs::create_dir_all(&root).unwrap();
    std::fs::write(root.join(name), bytes).unwrap();
}

fn asset(dir: &TempDir, name: &str) -> Option<Vec<u8>> {
    std::fs::read(dir.path().join("favicons").join(name)).ok()
}

#[tokio::test]
async fn test_site_without_icon_is_not_found() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    let err = pipeline(&dir)
        .fetch_favicon(&server.uri(), ResolveMode::Discover)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "NotFound");
}

#[tokio::test]
async fn test_fetch_then_theme_keeps_original() {
    let dir = TempDir::new().unwrap();
    let png = glyph_png();
    let server = site_with_png(&png).await;
    let pipeline = pipeline(&dir);

    let fetched = pipeline
        .fetch_favicon(&server.uri(), ResolveMode::Discover)
        .await
        .expect("fetch should succeed");
    assert_eq!(fetched.domain, "127.0.0.1");
    assert_eq!(fetched.reference.to_string(), "favicon:127_0_0_1.png");

    let converted = pipeline
        .convert(ConversionRequest::new(
            fetched.reference.clone(),
            TransformKind::Color("slate".into()),
        ))
        .await
        .expect("convert should succeed");

    assert_eq!(
        converted.reference.to_string(),
        "favicon:127_0_0_1_themed_Slate.png"
    );
    assert_eq!(converted.original, fetched.reference);
    assert_eq!(asset(&dir, "127_0_0_1.png").unwrap(), png);

    let original = pipeline.serve("favicon:127_0_0_1.png", Theme::Light).await.unwrap();
    assert_eq!(original.bytes, png);
    assert_eq!(original.content_type, "image/png");

    let themed = pipeline
        .serve(&converted.reference.to_string(), Theme::Light)
        .await
        .unwrap();
    let themed = IconImage::decode(&themed.bytes).unwrap();
    assert_eq!(themed.pixel(0, 0), Some([0x64, 0x74, 0x8b, 255]));
}

#[tokio::test]
async fn test_grayscale_pair_and_theme_serving() {
    let dir = TempDir::new().unwrap();
    seed(&dir, "github_abc123.png", &glyph_png());
    let pipeline = pipeline(&dir);

    let converted = pipeline
        .convert(ConversionRequest::new(
            IconReference::parse("favicon:github_abc123.png"),
            TransformKind::Grayscale,
        ))
        .await
        .unwrap();

    assert_eq!(
        converted.files,
        vec![
            "github_abc123_grayscale_black.png".to_string(),
            "github_abc123_grayscale_white.png".to_string(),
        ]
    );
    assert_eq!(
        converted.reference.to_string(),
        "favicon:github_abc123_grayscale.png"
    );

    let white = asset(&dir, "github_abc123_grayscale_white.png").expect("white variant");
    let black = asset(&dir, "github_abc123_grayscale_black.png").expect("black variant");

    let dark = pipeline
        .serve("favicon:github_abc123_grayscale.png", Theme::Dark)
        .await
        .unwrap();
    assert_eq!(dark.bytes, white);

    let light = pipeline
        .serve("favicon:github_abc123_grayscale.png", Theme::Light)
        .await
        .unwrap();
    assert_eq!(light.bytes, black);
}

#[tokio::test]
async fn test_batch_with_one_timeout() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(&dir);

    let mut servers = Vec::new();
    for index in 0..5 {
        let delay = (index == 2).then(|| Duration::from_secs(5));
        servers.push(site_with_ico(delay).await);
    }
    let items: Vec<BatchItem> = servers
        .iter()
        .enumerate()
        .map(|(index, server)| {
            BatchItem::new(index as i64 + 1, server.uri())
                .with_name(format!("Item {}", index + 1))
                .with_section("Media")
        })
        .collect();

    let started = std::time::Instant::now();
    let summary = pipeline.batch_fetch(items).await.expect("batch never fails");

    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(summary.total, 5);
    assert_eq!(summary.successful, 4);

    let failures: Vec<_> = summary.failures().collect();
    assert_eq!(failures.len(), summary.total - summary.successful);
    assert_eq!(failures[0].id, 3);
    assert_eq!(failures[0].name.as_deref(), Some("Item 3"));
    assert_eq!(failures[0].section.as_deref(), Some("Media"));
    assert_eq!(failures[0].url, servers[2].uri());

    let ids: Vec<i64> = summary.results.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    assert_eq!(summary.results[2].state, ItemState::Failed);

    // Same domain, distinct files.
    let mut names: Vec<String> = summary
        .stored()
        .map(|(_, outcome)| outcome.reference.to_string())
        .collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), 4);
}

/// Answers after a fixed delay and records when each request arrived.
#[derive(Clone)]
struct SlowRecorder {
    delay: Duration,
    arrivals: Arc<Mutex<Vec<Instant>>>,
    response: ResponseTemplate,
}

impl Respond for SlowRecorder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.arrivals.lock().unwrap().push(Instant::now());
        self.response.clone().set_delay(self.delay)
    }
}

impl SlowRecorder {
    /// Most requests provably in flight at once. A request is still open for
    /// at least `delay` after it arrives, so every arrival within `delay`
    /// before another one overlaps it.
    fn peak_in_flight(&self) -> usize {
        let arrivals = self.arrivals.lock().unwrap();
        arrivals
            .iter()
            .map(|&at| {
                arrivals
                    .iter()
                    .filter(|&&other| other <= at && at.duration_since(other) < self.delay)
                    .count()
            })
            .max()
            .unwrap_or(0)
    }
}

#[tokio::test]
async fn test_batch_respects_max_concurrency() {
    let dir = TempDir::new().unwrap();
    init_tracing();
    let pipeline = IconPipeline::new(config(&dir).with_max_concurrency(2)).unwrap();

    let delay = Duration::from_millis(200);
    let arrivals = Arc::new(Mutex::new(Vec::new()));
    let root = SlowRecorder {
        delay,
        arrivals: arrivals.clone(),
        response: ResponseTemplate::new(404),
    };
    let icon = SlowRecorder {
        delay,
        arrivals: arrivals.clone(),
        response: ResponseTemplate::new(200)
            .insert_header("content-type", "image/x-icon")
            .set_body_bytes(ICO_MAGIC.to_vec()),
    };

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(root.clone())
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/favicon.ico"))
        .respond_with(icon)
        .mount(&server)
        .await;

    let items: Vec<BatchItem> = (1..=8)
        .map(|id| BatchItem::new(id, server.uri()))
        .collect();
    let summary = pipeline.batch_fetch(items).await.unwrap();

    assert_eq!(summary.successful, 8);
    assert!(arrivals.lock().unwrap().len() >= 16);
    let peak = root.peak_in_flight();
    assert!(peak <= 2, "{peak} requests in flight with a limit of 2");
}

#[tokio::test]
async fn test_empty_batch_is_invalid() {
    let dir = TempDir::new().unwrap();
    let err = pipeline(&dir).batch_fetch(Vec::new()).await.unwrap_err();
    assert!(matches!(err, IconError::InvalidInput(_)));
}

#[tokio::test]
async fn test_recolor_is_deterministic() {
    let dir = TempDir::new().unwrap();
    seed(&dir, "site.png", &glyph_png());
    let pipeline = pipeline(&dir);
    let request = ConversionRequest::new(
        IconReference::parse("favicon:site.png"),
        TransformKind::Color("Rose".into()),
    );

    pipeline.convert(request.clone()).await.unwrap();
    let first = asset(&dir, "site_themed_Rose.png").unwrap();
    pipeline.convert(request).await.unwrap();
    let second = asset(&dir, "site_themed_Rose.png").unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_converting_a_variant_uses_the_original() {
    let dir = TempDir::new().unwrap();
    seed(&dir, "site.png", &glyph_png());
    let pipeline = pipeline(&dir);

    let inverted = pipeline
        .convert(ConversionRequest::new(
            IconReference::parse("favicon:site.png"),
            TransformKind::Invert,
        ))
        .await
        .unwrap();
    let once = asset(&dir, "site_inverted.png").unwrap();

    let again = pipeline
        .convert(ConversionRequest::new(inverted.reference.clone(), TransformKind::Invert))
        .await
        .unwrap();

    assert_eq!(again.reference, inverted.reference);
    assert_eq!(again.original.to_string(), "favicon:site.png");
    assert_eq!(asset(&dir, "site_inverted.png").unwrap(), once);
    assert!(asset(&dir, "site_inverted_inverted.png").is_none());

    let themed_from_gray = pipeline
        .convert(ConversionRequest::new(
            IconReference::parse("favicon:site_grayscale.png"),
            TransformKind::Color("Blue".into()),
        ))
        .await
        .unwrap();
    assert_eq!(
        themed_from_gray.reference.to_string(),
        "favicon:site_themed_Blue.png"
    );
}

#[tokio::test]
async fn test_undecodable_source_writes_nothing() {
    let dir = TempDir::new().unwrap();
    seed(&dir, "junk.png", b"<html>not an icon</html>");
    let pipeline = pipeline(&dir);

    let err = pipeline
        .convert(ConversionRequest::new(
            IconReference::parse("favicon:junk.png"),
            TransformKind::Grayscale,
        ))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "DecodeFailed");
    assert!(asset(&dir, "junk_grayscale_black.png").is_none());
    assert!(asset(&dir, "junk_grayscale_white.png").is_none());
}

#[tokio::test]
async fn test_failed_grayscale_leaves_no_half_pair() {
    let dir = TempDir::new().unwrap();
    seed(&dir, "app.png", &glyph_png());
    // A directory on the white variant's name makes that write fail.
    std::fs::create_dir(dir.path().join("favicons").join("app_grayscale_white.png")).unwrap();
    let pipeline = pipeline(&dir);

    let err = pipeline
        .convert(ConversionRequest::new(
            IconReference::parse("favicon:app.png"),
            TransformKind::Grayscale,
        ))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "WriteFailed");
    assert!(asset(&dir, "app_grayscale_black.png").is_none());
    assert_eq!(asset(&dir, "app.png").unwrap(), glyph_png());
}

#[tokio::test]
async fn test_untransformable_references() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(&dir);

    for source in ["mdiHome", ""] {
        let err = pipeline
            .convert(ConversionRequest::new(
                IconReference::parse(source),
                TransformKind::Invert,
            ))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "Unsupported", "{source:?}");
    }

    let err = pipeline
        .convert(ConversionRequest::new(
            IconReference::parse("favicon:missing.png"),
            TransformKind::Invert,
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NotFound");
}

#[tokio::test]
async fn test_unknown_color_touches_nothing() {
    let dir = TempDir::new().unwrap();
    seed(&dir, "site.png", &glyph_png());
    let pipeline = pipeline(&dir);

    let err = pipeline
        .convert(ConversionRequest::new(
            IconReference::parse("favicon:site.png"),
            TransformKind::Color("Chartreuse".into()),
        ))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "InvalidInput");
    assert_eq!(pipeline.store().file_names().unwrap(), vec!["site.png".to_string()]);
}

#[tokio::test]
async fn test_catalog_icon_is_materialized_before_transform() {
    let dir = TempDir::new().unwrap();
    let cdn = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/png/plex.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(glyph_png()),
        )
        .expect(1)
        .mount(&cdn)
        .await;

    init_tracing();
    let pipeline = IconPipeline::new(
        config(&dir).with_remote_catalog_url(format!("{}/png/{{id}}.png", cdn.uri())),
    )
    .unwrap();

    let request = ConversionRequest::new(
        IconReference::parse("selfhst:plex"),
        TransformKind::Color("Red".into()),
    );
    let converted = pipeline.convert(request.clone()).await.unwrap();

    assert_eq!(converted.original.to_string(), "favicon:selfhst-plex.png");
    assert_eq!(
        converted.reference.to_string(),
        "favicon:selfhst-plex_themed_Red.png"
    );
    assert_eq!(asset(&dir, "selfhst-plex.png").unwrap(), glyph_png());

    // The stored copy is reused.
    pipeline.convert(request).await.unwrap();
}

#[tokio::test]
async fn test_missing_catalog_icon() {
    let dir = TempDir::new().unwrap();
    let cdn = MockServer::start().await;

    init_tracing();
    let pipeline = IconPipeline::new(
        config(&dir).with_remote_catalog_url(format!("{}/png/{{id}}.png", cdn.uri())),
    )
    .unwrap();

    let err = pipeline
        .convert(ConversionRequest::new(
            IconReference::parse("selfhst:does-not-exist"),
            TransformKind::Invert,
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NotFound");
    assert!(pipeline.store().file_names().unwrap().is_empty());
}

#[tokio::test]
async fn test_revert_finds_non_png_original() {
    let dir = TempDir::new().unwrap();
    seed(&dir, "nas_local.ico", ICO_MAGIC);
    seed(&dir, "nas_local_themed_Teal.png", &glyph_png());
    let pipeline = pipeline(&dir);

    let variant = IconReference::parse("favicon:nas_local_themed_Teal.png");
    assert_eq!(variant.original().to_string(), "favicon:nas_local.png");

    let reverted = pipeline.revert(&variant).await.unwrap();
    assert_eq!(reverted.to_string(), "favicon:nas_local.ico");

    let catalog = IconReference::parse("selfhst:plex");
    assert_eq!(pipeline.revert(&catalog).await.unwrap(), catalog);

    let orphan = IconReference::parse("favicon:gone_inverted.png");
    assert_eq!(pipeline.revert(&orphan).await.unwrap_err().code(), "NotFound");
}

#[tokio::test]
async fn test_direct_mode_fetch() {
    let dir = TempDir::new().unwrap();
    let png = glyph_png();
    let server = site_with_png(&png).await;

    let fetched = pipeline(&dir)
        .fetch_favicon(&format!("{}/icon.png", server.uri()), ResolveMode::Direct)
        .await
        .unwrap();

    assert_eq!(asset(&dir, fetched.reference.local_name().unwrap()).unwrap(), png);
}
