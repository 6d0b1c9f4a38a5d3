//! Index page object against the scripted page.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use image::{ImageEncoder, Rgba, RgbaImage};
use sitecheck::config::{ArtifactCapture, ScreenshotConfig, SnapshotUpdate};
use sitecheck::prelude::*;
use sitecheck::{MockDriver, MockElement, Page, PageSettings};

fn settings(root: &Path, update: SnapshotUpdate) -> PageSettings {
    PageSettings {
        expect_timeout: Duration::from_millis(500),
        action_timeout: Duration::from_millis(500),
        screenshot: ScreenshotConfig {
            snapshot_dir: root.join("pages-screenshots"),
            update,
            ..ScreenshotConfig::default()
        },
        artifact_dir: root.join("artifacts"),
        capture: ArtifactCapture::none(),
        ..PageSettings::default()
    }
}

fn index_page(driver: MockDriver, root: &Path, update: SnapshotUpdate) -> (IndexPage, Arc<MockDriver>) {
    let driver = Arc::new(driver);
    let page = Page::new(driver.clone(), settings(root, update));
    (IndexPage::new(page), driver)
}

fn encode(img: &RgbaImage) -> Vec<u8> {
    let mut buffer = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buffer)
        .write_image(img.as_raw(), img.width(), img.height(), image::ExtendedColorType::Rgba8)
        .unwrap();
    buffer
}

/// 100x100 white PNG with the first `n` pixels black
fn png_with_changed_pixels(n: u32) -> Vec<u8> {
    let mut img = RgbaImage::from_pixel(100, 100, Rgba([255, 255, 255, 255]));
    for i in 0..n {
        img.put_pixel(i % 100, i / 100, Rgba([0, 0, 0, 255]));
    }
    encode(&img)
}

mod elements_loaded {
    use super::*;

    #[tokio::test]
    async fn test_goto_then_elements_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let (index, driver) = index_page(MockDriver::serving_index(), dir.path(), SnapshotUpdate::None);

        index.goto().await.unwrap();
        index.assert_page_elements_loaded().await.unwrap();
        assert_eq!(driver.history()[0], "navigate:http://localhost:3000/");
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_heading_name_fails() {
        let dir = tempfile::tempdir().unwrap();
        let driver = Arc::new(MockDriver::serving_index());
        let page = Page::new(driver, settings(dir.path(), SnapshotUpdate::None));
        let index = IndexPage::builder(page).heading_name("Another Website").build();

        index.goto().await.unwrap();
        let err = index.assert_page_elements_loaded().await.unwrap_err();
        assert_eq!(err.kind(), "AssertionError");
        assert!(err.to_string().contains("Another Website"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_title_failure_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let traced = PageSettings {
            capture: ArtifactCapture {
                trace: true,
                ..ArtifactCapture::none()
            },
            ..settings(dir.path(), SnapshotUpdate::None)
        };
        let driver = Arc::new(MockDriver::serving_index().with_title("Something else"));
        let index = IndexPage::new(Page::new(driver, traced));
        index.goto().await.unwrap();
        let err = index.assert_page_elements_loaded().await.unwrap_err();
        assert!(err.to_string().contains("page title"));

        let names: Vec<String> = index
            .page()
            .trace()
            .actions()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert!(names.contains(&"toHaveTitle".to_string()));
        assert!(!names.contains(&"toBeVisible".to_string()));
    }

    #[tokio::test]
    async fn test_unreachable_target() {
        let dir = tempfile::tempdir().unwrap();
        let (index, _) = index_page(MockDriver::serving_index().unreachable(), dir.path(), SnapshotUpdate::None);
        let err = index.goto().await.unwrap_err();
        assert_eq!(err.kind(), "NavigationError");
    }
}

mod action_button {
    use super::*;

    #[tokio::test]
    async fn test_click_shows_message() {
        let dir = tempfile::tempdir().unwrap();
        let (index, _) = index_page(MockDriver::serving_index(), dir.path(), SnapshotUpdate::None);

        index.goto().await.unwrap();
        index.click_action_button().await.unwrap();
        index.assert_message_visible("Button clicked!").await.unwrap();
    }

    #[tokio::test]
    async fn test_click_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (index, driver) = index_page(MockDriver::serving_index(), dir.path(), SnapshotUpdate::None);

        index.goto().await.unwrap();
        index.click_action_button().await.unwrap();
        index.click_action_button().await.unwrap();
        index.assert_message_visible("Button clicked!").await.unwrap();
        assert_eq!(driver.text_of("message").as_deref(), Some("Button clicked!"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_message_hidden_before_click() {
        let dir = tempfile::tempdir().unwrap();
        let (index, _) = index_page(MockDriver::serving_index(), dir.path(), SnapshotUpdate::None);
        index.goto().await.unwrap();
        let err = index.assert_message_visible("Button clicked!").await.unwrap_err();
        assert_eq!(err.kind(), "AssertionError");
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_button_is_not_actionable() {
        let dir = tempfile::tempdir().unwrap();
        let driver = MockDriver::new()
            .with_title("Test Website")
            .with_element(MockElement::new("button").with_id("actionButton").disabled());
        let (index, driver) = index_page(driver, dir.path(), SnapshotUpdate::None);

        index.goto().await.unwrap();
        let err = index.click_action_button().await.unwrap_err();
        assert_eq!(err.kind(), "ActionabilityError");
        assert!(err.to_string().contains("disabled"));
        assert!(!driver.was_called("click"));
    }

    #[tokio::test]
    async fn test_duplicate_buttons_violate_strictness() {
        let dir = tempfile::tempdir().unwrap();
        let driver = MockDriver::new()
            .with_element(MockElement::new("button").with_id("actionButton"))
            .with_element(MockElement::new("button").with_id("actionButton"));
        let (index, _) = index_page(driver, dir.path(), SnapshotUpdate::None);

        index.goto().await.unwrap();
        let err = index.click_action_button().await.unwrap_err();
        assert!(err.to_string().contains("strict mode violation"));
    }

    #[tokio::test]
    async fn test_custom_locator() {
        let dir = tempfile::tempdir().unwrap();
        let (index, _) = index_page(MockDriver::serving_index(), dir.path(), SnapshotUpdate::None);
        index.goto().await.unwrap();
        expect(&index.custom_locator("actionButton"))
            .to_have_text("Click me")
            .await
            .unwrap();
    }
}

mod screenshot {
    use super::*;

    #[tokio::test]
    async fn test_missing_baseline_locally_writes_it_and_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (index, _) = index_page(MockDriver::serving_index(), dir.path(), SnapshotUpdate::Missing);
        index.goto().await.unwrap();

        let err = index.assert_page_screenshot().await.unwrap_err();
        assert!(matches!(err, CheckError::BaselineMissing { written: true, .. }));
        assert!(dir.path().join("pages-screenshots/Index.png").exists());
        assert!(dir.path().join("artifacts/Index-actual.png").exists());

        // Second run compares against the stored baseline.
        index.assert_page_screenshot().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_baseline_in_ci_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (index, _) = index_page(MockDriver::serving_index(), dir.path(), SnapshotUpdate::None);
        index.goto().await.unwrap();

        let err = index.assert_page_screenshot().await.unwrap_err();
        assert!(matches!(err, CheckError::BaselineMissing { written: false, .. }));
        assert!(!dir.path().join("pages-screenshots/Index.png").exists());
    }

    #[tokio::test]
    async fn test_update_all_writes_and_passes() {
        let dir = tempfile::tempdir().unwrap();
        let (index, _) = index_page(MockDriver::serving_index(), dir.path(), SnapshotUpdate::All);
        index.goto().await.unwrap();
        index.assert_page_screenshot().await.unwrap();
        assert!(dir.path().join("pages-screenshots/Index.png").exists());
    }

    #[tokio::test]
    async fn test_capture_uses_canonical_viewport() {
        let dir = tempfile::tempdir().unwrap();
        let (index, driver) = index_page(MockDriver::serving_index(), dir.path(), SnapshotUpdate::All);
        index.goto().await.unwrap();
        index.assert_page_screenshot().await.unwrap();

        assert!(driver.was_called("viewport:1280x720"));
        assert!(driver.was_called("screenshot:full_page=true"));
        let baseline = std::fs::read(dir.path().join("pages-screenshots/Index.png")).unwrap();
        let img = image::load_from_memory(&baseline).unwrap();
        assert_eq!((img.width(), img.height()), (1280, 720));
    }

    #[tokio::test]
    async fn test_deterministic_page_matches_twice() {
        let dir = tempfile::tempdir().unwrap();
        let (first, _) = index_page(MockDriver::serving_index(), dir.path(), SnapshotUpdate::All);
        first.goto().await.unwrap();
        first.assert_page_screenshot().await.unwrap();

        for _ in 0..2 {
            let (index, _) = index_page(MockDriver::serving_index(), dir.path(), SnapshotUpdate::None);
            index.goto().await.unwrap();
            index.assert_page_screenshot().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_two_percent_difference_passes() {
        let dir = tempfile::tempdir().unwrap();
        let shots = dir.path().join("pages-screenshots");
        std::fs::create_dir_all(&shots).unwrap();
        std::fs::write(shots.join("Index.png"), png_with_changed_pixels(0)).unwrap();

        // 200 of 10_000 pixels = exactly 0.02
        let driver = MockDriver::serving_index().with_screenshot(png_with_changed_pixels(200));
        let (index, _) = index_page(driver, dir.path(), SnapshotUpdate::None);
        index.goto().await.unwrap();
        index.assert_page_screenshot().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_above_two_percent_fails_with_diff() {
        let dir = tempfile::tempdir().unwrap();
        let shots = dir.path().join("pages-screenshots");
        std::fs::create_dir_all(&shots).unwrap();
        std::fs::write(shots.join("Index.png"), png_with_changed_pixels(0)).unwrap();

        let driver = MockDriver::serving_index().with_screenshot(png_with_changed_pixels(201));
        let (index, _) = index_page(driver, dir.path(), SnapshotUpdate::None);
        index.goto().await.unwrap();

        let err = index.assert_page_screenshot().await.unwrap_err();
        match err {
            CheckError::VisualMismatch {
                ratio, diff_path, ..
            } => {
                assert!((ratio - 0.0201).abs() < 1e-9);
                let diff_path = diff_path.expect("diff image written");
                assert_eq!(diff_path, dir.path().join("artifacts/Index-diff.png"));
                assert!(diff_path.exists());
                assert!(dir.path().join("artifacts/Index-expected.png").exists());
            }
            other => panic!("expected VisualMismatch, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_taller_capture_fails_with_diff() {
        let dir = tempfile::tempdir().unwrap();
        let shots = dir.path().join("pages-screenshots");
        std::fs::create_dir_all(&shots).unwrap();
        std::fs::write(shots.join("Index.png"), png_with_changed_pixels(0)).unwrap();

        let taller = encode(&RgbaImage::from_pixel(100, 140, Rgba([255, 255, 255, 255])));
        let driver = MockDriver::serving_index().with_screenshot(taller);
        let (index, _) = index_page(driver, dir.path(), SnapshotUpdate::None);
        index.goto().await.unwrap();

        match index.assert_page_screenshot().await.unwrap_err() {
            CheckError::VisualMismatch {
                ratio, diff_path, ..
            } => {
                assert!((ratio - 1.0).abs() < f64::EPSILON);
                let diff_path = diff_path.expect("diff image written");
                let diff = image::open(&diff_path).unwrap().to_rgba8();
                assert_eq!(diff.dimensions(), (100, 140));
                assert_eq!(*diff.get_pixel(50, 120), Rgba([255, 0, 0, 255]));
            }
            other => panic!("expected VisualMismatch, got {other:?}"),
        }
    }
}
