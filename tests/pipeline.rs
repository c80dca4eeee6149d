//! End-to-end pipeline tests against the in-memory store, with a mock HTTP
//! origin standing in for the WordPress uploads directory.

mod common;

use async_trait::async_trait;
use common::{export_xml, Item};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wp_sanity_migrate::assets::ImageFetcher;
use wp_sanity_migrate::pipeline::{run_migration, MigrationOptions};
use wp_sanity_migrate::progress::NoProgress;
use wp_sanity_migrate::report::MigrationReport;
use wp_sanity_migrate::store::{ContentStore, ImageUpload, InMemoryStore};
use wp_sanity_migrate::wxr::parse_export;
use wp_sanity_migrate::MigrateError;

const SITE: &str = "https://blog.example.com";

async fn migrate(
    xml: &str,
    store: &InMemoryStore,
    fetcher: Option<&ImageFetcher>,
    options: &MigrationOptions,
) -> wp_sanity_migrate::Result<MigrationReport> {
    let export = parse_export(xml).unwrap();
    run_migration(&export, store, fetcher, options, &NoProgress).await
}

async fn image_origin() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wp-content/uploads/cat.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3], "image/jpeg"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wp-content/uploads/gone.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn writes_references_then_posts() {
    let xml = export_xml(
        SITE,
        &[Item::post("100", "Hello")
            .category("Tech")
            .category("Life")
            .tag("Rust")],
    );
    let store = InMemoryStore::new();
    let report = migrate(&xml, &store, None, &MigrationOptions::default())
        .await
        .unwrap();

    assert_eq!(
        store.document_ids(),
        vec!["author-1", "category-5", "category-6", "post-100", "tag-9"]
    );
    assert_eq!(report.posts_migrated, 1);

    let post = store.document("post-100").unwrap();
    assert_eq!(post["_type"], "post");
    assert_eq!(post["title"], json!({"_type": "localeString", "ja": "Hello"}));
    assert_eq!(post["slug"]["current"], "post-100");
    assert_eq!(post["publishedAt"], "2023-04-01T09:30:00.000Z");
    assert_eq!(post["author"], json!({"_type": "reference", "_ref": "author-1"}));
    assert_eq!(
        post["categories"],
        json!([{"_type": "reference", "_ref": "category-5", "_key": "category-5"}])
    );
    assert_eq!(
        post["tags"],
        json!([{"_type": "reference", "_ref": "tag-9", "_key": "tag-9"}])
    );
    assert_eq!(post["body"]["_type"], "localeBlock");
    assert_eq!(post["body"]["ja"][0]["children"][0]["text"], "Hello.");
    assert!(post.get("mainImage").is_none());

    let life = store.document("category-6").unwrap();
    assert_eq!(life["slug"]["current"], "日常");
    assert_eq!(life["title"]["ja"], "Life");
}

#[tokio::test]
async fn all_categories_when_first_only_is_off() {
    let xml = export_xml(SITE, &[Item::post("1", "A").category("Life").category("Tech")]);
    let store = InMemoryStore::new();
    let options = MigrationOptions {
        first_category_only: false,
        ..MigrationOptions::default()
    };
    migrate(&xml, &store, None, &options).await.unwrap();

    let refs: Vec<String> = store.document("post-1").unwrap()["categories"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["_ref"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(refs, vec!["category-6", "category-5"]);
}

#[tokio::test]
async fn rerun_converges_on_the_same_documents() {
    let xml = export_xml(
        SITE,
        &[
            Item::post("1", "One").category("Tech"),
            Item::post("2", "Two").tag("Rust"),
        ],
    );
    let store = InMemoryStore::new();
    let options = MigrationOptions::default();

    migrate(&xml, &store, None, &options).await.unwrap();
    let first_ids = store.document_ids();
    let first_post = store.document("post-1").unwrap();
    let first_writes = store.write_count();

    migrate(&xml, &store, None, &options).await.unwrap();
    assert_eq!(store.document_ids(), first_ids);
    assert_eq!(store.document("post-1").unwrap(), first_post);
    assert_eq!(store.write_count(), first_writes * 2);
}

#[tokio::test]
async fn only_published_posts_are_migrated() {
    let xml = export_xml(
        SITE,
        &[
            Item::post("1", "Live"),
            Item::post("2", "Draft").status("draft").date("0000-00-00 00:00:00"),
            Item::post("3", "About").post_type("page"),
            Item::post("4", "Gone").status("trash"),
            Item::attachment("5", "/wp-content/uploads/cat.jpg"),
        ],
    );
    let store = InMemoryStore::new();
    let report = migrate(&xml, &store, None, &MigrationOptions::default())
        .await
        .unwrap();

    assert_eq!(store.documents_of_type("post").len(), 1);
    assert!(store.document("post-1").is_some());
    assert_eq!(report.items_total, 5);
    assert_eq!(report.attachments_mapped, 1);
    assert_eq!(report.items_dropped.values().sum::<usize>(), 3);
    assert_eq!(report.posts_selected, 1);
}

#[tokio::test]
async fn thumbnails_upload_or_degrade_per_post() {
    let origin = image_origin().await;
    let site = origin.uri();
    let xml = export_xml(
        &site,
        &[
            Item::attachment("40", "/wp-content/uploads/cat.jpg"),
            Item::attachment("41", &format!("{}/wp-content/uploads/gone.jpg", site)),
            Item::attachment("42", "http://127.0.0.1:1/unreachable.jpg"),
            Item::post("1", "With image").thumbnail("40"),
            Item::post("2", "Broken image").thumbnail("41"),
            Item::post("3", "Unreachable image").thumbnail("42"),
            Item::post("4", "Missing attachment").thumbnail("999"),
            Item::post("5", "No image"),
        ],
    );
    let store = InMemoryStore::new();
    let fetcher = ImageFetcher::new(reqwest::Client::new());
    let report = migrate(&xml, &store, Some(&fetcher), &MigrationOptions::default())
        .await
        .unwrap();

    assert_eq!(report.posts_migrated, 5);
    assert!(!report.has_failures());
    assert_eq!(report.thumbnails.uploaded, 1);
    assert_eq!(report.thumbnails.failed, 2);
    assert_eq!(report.thumbnails.missing_attachment, 1);

    let with_image = store.document("post-1").unwrap();
    assert_eq!(with_image["mainImage"]["_type"], "image");
    let asset_ref = with_image["mainImage"]["asset"]["_ref"].as_str().unwrap();
    assert!(asset_ref.starts_with("image-"));
    assert!(asset_ref.ends_with("-jpg"));

    for id in ["post-2", "post-3", "post-4", "post-5"] {
        let doc = store.document(id).unwrap();
        assert!(doc.get("mainImage").is_none(), "{} has a main image", id);
    }

    let assets = store.assets();
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].filename, "cat.jpg");
    assert_eq!(assets[0].content_type.as_deref(), Some("image/jpeg"));
}

/// Accepts documents but answers every image upload with a 500.
struct RejectUploads(InMemoryStore);

#[async_trait]
impl ContentStore for RejectUploads {
    fn name(&self) -> String {
        "reject-uploads".to_string()
    }

    async fn create_or_replace(&self, document: &serde_json::Value) -> wp_sanity_migrate::Result<()> {
        self.0.create_or_replace(document).await
    }

    async fn upload_image(&self, _image: &ImageUpload) -> wp_sanity_migrate::Result<String> {
        Err(MigrateError::Store {
            status: 500,
            body: "asset pipeline unavailable".to_string(),
        })
    }
}

#[tokio::test]
async fn rejected_upload_leaves_post_without_main_image() {
    let origin = image_origin().await;
    let xml = export_xml(
        &origin.uri(),
        &[
            Item::attachment("40", "/wp-content/uploads/cat.jpg"),
            Item::post("1", "Upload rejected").thumbnail("40"),
            Item::post("2", "Next in line"),
        ],
    );
    let export = parse_export(&xml).unwrap();
    let store = RejectUploads(InMemoryStore::new());
    let fetcher = ImageFetcher::new(reqwest::Client::new());
    let report = run_migration(
        &export,
        &store,
        Some(&fetcher),
        &MigrationOptions::default(),
        &NoProgress,
    )
    .await
    .unwrap();

    assert_eq!(report.store, "reject-uploads");
    assert_eq!(report.posts_migrated, 2);
    assert!(!report.has_failures());
    assert_eq!(report.thumbnails.uploaded, 0);
    assert_eq!(report.thumbnails.failed, 1);

    let rejected = store.0.document("post-1").unwrap();
    assert_eq!(rejected["title"]["ja"], "Upload rejected");
    assert!(rejected.get("mainImage").is_none());
    assert!(report.migrated[0].main_image.is_none());
    assert!(store.0.document("post-2").is_some());
    assert_eq!(store.0.upload_count(), 0);
}

#[tokio::test]
async fn skipping_images_never_touches_the_network() {
    let xml = export_xml(
        SITE,
        &[
            Item::attachment("40", "/wp-content/uploads/cat.jpg"),
            Item::post("1", "With image").thumbnail("40"),
        ],
    );
    let store = InMemoryStore::new();
    let report = migrate(&xml, &store, None, &MigrationOptions::default())
        .await
        .unwrap();

    assert_eq!(report.thumbnails.skipped, 1);
    assert_eq!(store.upload_count(), 0);
    assert!(store.document("post-1").unwrap().get("mainImage").is_none());
}

#[tokio::test]
async fn unresolved_terms_are_left_out_and_reported() {
    let xml = export_xml(
        SITE,
        &[Item::post("1", "A").category("Nowhere").category("Tech").tag("Go")],
    );
    let store = InMemoryStore::new();
    let report = migrate(&xml, &store, None, &MigrationOptions::default())
        .await
        .unwrap();

    let post = store.document("post-1").unwrap();
    assert_eq!(post["categories"][0]["_ref"], "category-5");
    assert_eq!(post["tags"], json!([]));
    assert_eq!(
        report.migrated[0].unresolved_terms,
        vec!["category:Nowhere", "tag:Go"]
    );
}

#[tokio::test]
async fn a_bad_post_does_not_stop_the_batch() {
    let xml = export_xml(
        SITE,
        &[
            Item::post("1", "Fine"),
            Item::post("2", "Broken date").date("yesterday"),
            Item::post("3", "Also fine"),
        ],
    );
    let store = InMemoryStore::new();
    let report = migrate(&xml, &store, None, &MigrationOptions::default())
        .await
        .unwrap();

    assert_eq!(report.posts_migrated, 2);
    assert_eq!(report.failed_posts.len(), 1);
    assert_eq!(report.failed_posts[0].post_id, "2");
    assert_eq!(report.failed_posts[0].title, "Broken date");
    assert!(store.document("post-3").is_some());
    assert!(store.document("post-2").is_none());
}

#[tokio::test]
async fn fail_fast_stops_at_the_first_bad_post() {
    let xml = export_xml(
        SITE,
        &[
            Item::post("1", "Fine"),
            Item::post("2", "Broken date").date("yesterday"),
            Item::post("3", "Never reached"),
        ],
    );
    let store = InMemoryStore::new();
    let options = MigrationOptions {
        continue_on_error: false,
        ..MigrationOptions::default()
    };
    let err = migrate(&xml, &store, None, &options).await.unwrap_err();

    assert!(matches!(err, MigrateError::Timestamp { ref post_id, .. } if post_id == "2"));
    assert!(store.document("post-1").is_some());
    assert!(store.document("post-3").is_none());
}

#[tokio::test]
async fn limit_caps_selected_posts() {
    let xml = export_xml(
        SITE,
        &[
            Item::post("1", "One"),
            Item::post("2", "Two"),
            Item::post("3", "Three"),
        ],
    );
    let store = InMemoryStore::new();
    let options = MigrationOptions {
        limit: Some(2),
        ..MigrationOptions::default()
    };
    let report = migrate(&xml, &store, None, &options).await.unwrap();

    assert_eq!(report.posts_selected, 2);
    assert_eq!(store.documents_of_type("post").len(), 2);
    assert!(store.document("post-3").is_none());
}

#[tokio::test]
async fn speech_bubbles_survive_into_the_body() {
    let html = r#"<p>Intro</p>
<div class="balloon_l">
  <div class="faceicon"><img src="https://blog.example.com/face.png" alt="Gomix"><p>Gomix</p></div>
  <div class="chatting"><div class="says"><p>Hi <strong>there</strong></p></div></div>
</div>
<p>Outro</p>"#;
    let xml = export_xml(SITE, &[Item::post("1", "Chat").content(html)]);
    let store = InMemoryStore::new();
    let options = MigrationOptions {
        language: "en".to_string(),
        ..MigrationOptions::default()
    };
    migrate(&xml, &store, None, &options).await.unwrap();

    let post = store.document("post-1").unwrap();
    let body = post["body"]["en"].as_array().unwrap();
    let types: Vec<&str> = body.iter().map(|n| n["_type"].as_str().unwrap()).collect();
    assert_eq!(types, vec!["block", "speechBubble", "block"]);

    let bubble = &body[1];
    assert_eq!(bubble["speaker"], "Gomix");
    assert_eq!(bubble["avatar"], "https://blog.example.com/face.png");
    assert_eq!(bubble["position"], "left");
    assert_eq!(bubble["text"][0]["_type"], "block");
    assert_eq!(bubble["text"][0]["children"][1]["marks"], json!(["strong"]));

    let mut keys: Vec<&str> = body.iter().map(|n| n["_key"].as_str().unwrap()).collect();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), 3);
}
