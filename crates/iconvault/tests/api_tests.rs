//! The host-facing service over an in-memory item store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use iconvault::api::{
    BatchRequest, ConvertKind, ConvertRequest, FetchRequest, IconService, ItemKind, ItemRecord,
    ItemStore, ServeRequest, ThemeSource,
};
use iconvault::{IconError, IconPipeline, IconReference, PipelineConfig, Theme};
use iconvault_render::IconImage;
use iconvault_render::image::{Rgba, RgbaImage};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct MemoryItems {
    items: Mutex<HashMap<(ItemKind, i64), ItemRecord>>,
}

impl MemoryItems {
    fn insert(&self, kind: ItemKind, id: i64, url: &str) {
        self.items.lock().unwrap().insert(
            (kind, id),
            ItemRecord {
                id,
                name: format!("Item {id}"),
                url: Some(url.to_string()),
                section: Some("Home".to_string()),
                icon: IconReference::Empty,
            },
        );
    }

    fn icon(&self, kind: ItemKind, id: i64) -> IconReference {
        self.items.lock().unwrap()[&(kind, id)].icon.clone()
    }
}

impl ItemStore for MemoryItems {
    fn item(&self, kind: ItemKind, id: i64) -> Option<ItemRecord> {
        self.items.lock().unwrap().get(&(kind, id)).cloned()
    }

    fn set_icon(&self, kind: ItemKind, id: i64, icon: &IconReference) -> iconvault::Result<()> {
        let mut items = self.items.lock().unwrap();
        let record = items
            .get_mut(&(kind, id))
            .ok_or_else(|| IconError::NotFound(format!("item {id}")))?;
        record.icon = icon.clone();
        Ok(())
    }
}

struct FixedTheme(Option<&'static str>);

impl ThemeSource for FixedTheme {
    fn theme_color(&self) -> Option<String> {
        self.0.map(str::to_string)
    }
}

fn service(dir: &TempDir, theme: Option<&'static str>) -> IconService<MemoryItems, FixedTheme> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let config = PipelineConfig::new(dir.path().join("favicons"))
        .with_fetch_timeout(Duration::from_millis(500))
        .with_max_concurrency(5);
    let pipeline = IconPipeline::new(config).unwrap();
    IconService::new(pipeline, MemoryItems::default(), FixedTheme(theme))
}

fn glyph_png() -> Vec<u8> {
    let img = RgbaImage::from_fn(4, 4, |x, _| {
        if x == 0 { Rgba([0, 0, 0, 255]) } else { Rgba([255, 255, 255, 255]) }
    });
    IconImage::from_rgba_image(img).unwrap().to_png().unwrap()
}

async fn png_site(delay: Option<Duration>) -> MockServer {
    let server = MockServer::start().await;
    let mut icon = ResponseTemplate::new(200)
        .insert_header("content-type", "image/png")
        .set_body_bytes(glyph_png());
    let mut root = ResponseTemplate::new(200)
        .insert_header("content-type", "text/html")
        .set_body_string(r#"<link rel="apple-touch-icon" href="/touch.png">"#);
    if let Some(delay) = delay {
        icon = icon.set_delay(delay);
        root = root.set_delay(delay);
    }
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(root)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/touch.png"))
        .respond_with(icon)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_fetch_without_icon_reports_not_found() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    let response = service(&dir, None)
        .fetch(&FetchRequest {
            url: server.uri(),
            direct_url_mode: false,
        })
        .await;

    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("NotFound"));
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        serde_json::json!({"success": false, "error": "NotFound"})
    );
}

#[tokio::test]
async fn test_fetch_and_convert_with_theme_color() {
    let dir = TempDir::new().unwrap();
    let server = png_site(None).await;
    let service = service(&dir, Some("Emerald"));

    let fetched = service
        .fetch(&FetchRequest {
            url: server.uri(),
            direct_url_mode: false,
        })
        .await;
    assert!(fetched.success);
    assert_eq!(fetched.domain.as_deref(), Some("127.0.0.1"));
    let path = fetched.path.unwrap();

    let converted = service
        .convert(&ConvertRequest {
            kind: ConvertKind::Color,
            favicon: path.clone(),
            color: None,
            item_url: Some(server.uri()),
        })
        .await;
    assert!(converted.success);
    assert_eq!(
        converted.filename.as_deref(),
        Some("favicon:127_0_0_1_themed_Emerald.png")
    );

    let served = service
        .serve(&ServeRequest {
            path,
            theme: None,
        })
        .await
        .unwrap();
    assert_eq!(served.bytes, glyph_png());
}

#[tokio::test]
async fn test_color_convert_without_any_color() {
    let dir = TempDir::new().unwrap();
    let response = service(&dir, None)
        .convert(&ConvertRequest {
            kind: ConvertKind::Color,
            favicon: "favicon:anything.png".to_string(),
            color: None,
            item_url: None,
        })
        .await;
    assert_eq!(response.error.as_deref(), Some("InvalidInput"));
}

#[tokio::test]
async fn test_convert_library_component_is_unsupported() {
    let dir = TempDir::new().unwrap();
    let response = service(&dir, Some("Slate"))
        .convert(&ConvertRequest {
            kind: ConvertKind::Grayscale,
            favicon: "mdiHome".to_string(),
            color: None,
            item_url: None,
        })
        .await;
    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("Unsupported"));
}

#[tokio::test]
async fn test_batch_partial_success_updates_items() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, None);

    let mut servers = Vec::new();
    for id in 1..=5 {
        let delay = (id == 3).then(|| Duration::from_secs(5));
        let server = png_site(delay).await;
        service.items().insert(ItemKind::Bookmark, id, &server.uri());
        servers.push(server);
    }

    let response = service
        .batch(&BatchRequest {
            ids: vec![1, 2, 3, 4, 5],
            kind: ItemKind::Bookmark,
        })
        .await;

    assert!(response.success);
    assert_eq!(response.total, 5);
    assert_eq!(response.successful, 4);
    assert_eq!(response.failures.len(), 1);
    assert_eq!(response.failures[0].id, 3);
    assert_eq!(response.failures[0].name.as_deref(), Some("Item 3"));
    assert_eq!(response.failures[0].section.as_deref(), Some("Home"));

    for id in [1, 2, 4, 5] {
        assert!(matches!(
            service.items().icon(ItemKind::Bookmark, id),
            IconReference::Local(_)
        ));
    }
    assert!(service.items().icon(ItemKind::Bookmark, 3).is_empty());
}

#[tokio::test]
async fn test_batch_unknown_ids_are_item_failures() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, None);
    let server = png_site(None).await;
    service.items().insert(ItemKind::Service, 7, &server.uri());

    let response = service
        .batch(&BatchRequest {
            ids: vec![99, 7],
            kind: ItemKind::Service,
        })
        .await;

    assert!(response.success);
    assert_eq!(response.total, 2);
    assert_eq!(response.successful, 1);
    assert_eq!(response.failures[0].id, 99);
    assert_eq!(response.failures[0].error, "NotFound");
}

#[tokio::test]
async fn test_batch_rejects_bad_input() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, None);

    let empty = service
        .batch(&BatchRequest {
            ids: Vec::new(),
            kind: ItemKind::Bookmark,
        })
        .await;
    assert!(!empty.success);
    assert_eq!(empty.error.as_deref(), Some("InvalidInput"));

    let category = service
        .batch(&BatchRequest {
            ids: vec![1],
            kind: ItemKind::Category,
        })
        .await;
    assert!(!category.success);
    assert_eq!(category.error.as_deref(), Some("InvalidInput"));
}

#[tokio::test]
async fn test_revert_item_to_original() {
    let dir = TempDir::new().unwrap();
    let server = png_site(None).await;
    let service = service(&dir, None);
    service.items().insert(ItemKind::Service, 1, &server.uri());

    let batch = service
        .batch(&BatchRequest {
            ids: vec![1],
            kind: ItemKind::Service,
        })
        .await;
    assert_eq!(batch.successful, 1);
    let original = service.items().icon(ItemKind::Service, 1);

    let converted = service
        .convert(&ConvertRequest {
            kind: ConvertKind::Grayscale,
            favicon: original.to_string(),
            color: None,
            item_url: None,
        })
        .await;
    let variant = IconReference::parse(converted.filename.as_deref().unwrap());
    service
        .items()
        .set_icon(ItemKind::Service, 1, &variant)
        .unwrap();

    let dark = service
        .serve(&ServeRequest {
            path: variant.to_string(),
            theme: Some(Theme::Dark),
        })
        .await
        .unwrap();
    assert!(dark.name.ends_with("_grayscale_white.png"));

    let reverted = service.revert(ItemKind::Service, 1).await.unwrap();
    assert_eq!(reverted, original);
    assert_eq!(service.items().icon(ItemKind::Service, 1), original);
}
