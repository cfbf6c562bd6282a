mod common;

use common::*;
use std::sync::Arc;
use textspot::batch::{list_images, TIMING_LOG};
use textspot::{run_batch, BatchError, DetectorConfig, TextDetector, TextRecognizer};

fn descriptions(log: &str, stage: &str) -> Vec<String> {
    log.lines()
        .map(|line| line.split(';').collect::<Vec<_>>())
        .filter(|fields| fields[1] == stage)
        .map(|fields| fields[4].to_string())
        .collect()
}

#[test]
fn test_images_listed_in_natural_order() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    for name in ["img10.png", "img2.PNG", "img1.bmp", "notes.txt"] {
        std::fs::write(dir.path().join(name), b"")?;
    }
    std::fs::create_dir(dir.path().join("nested.png"))?;

    let names: Vec<String> = list_images(dir.path())?
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();

    assert_eq!(names, vec!["img1.bmp", "img2.PNG", "img10.png"]);
    Ok(())
}

#[test]
fn test_missing_input_directory_is_an_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let result = list_images(&dir.path().join("absent"));
    assert!(matches!(result, Err(BatchError::InputDir { .. })));
}

#[test]
fn test_batch_writes_outputs_and_timings() -> anyhow::Result<()> {
    let input = tempfile::TempDir::new()?;
    let output = tempfile::TempDir::new()?;
    write_blank_image(input.path(), "img10.png", 140, 80);
    write_blank_image(input.path(), "img2.png", 140, 80);
    std::fs::write(input.path().join("readme.txt"), "not an image")?;

    let out_dir = output.path().join("results");
    let detector = TextDetector::new(DetectorConfig::default(), None);
    let summary = run_batch(&detector, input.path(), &out_dir)?;

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.regions, 0);
    for stem in ["img2", "img10"] {
        let masked = image::open(out_dir.join(format!("{stem}_masked.png")))?;
        let rects = image::open(out_dir.join(format!("{stem}_rects.png")))?;
        assert_eq!((masked.width(), masked.height()), (1400, 800));
        assert_eq!((rects.width(), rects.height()), (1400, 800));
    }

    let log = std::fs::read_to_string(out_dir.join(TIMING_LOG))?;
    // imread, detect and one line per pipeline step for each image
    assert_eq!(log.lines().count(), 2 * 9);
    assert_eq!(descriptions(&log, "imread"), vec!["img2.png", "img10.png"]);
    assert_eq!(descriptions(&log, "detect"), vec!["img2.png", "img10.png"]);
    assert_eq!(descriptions(&log, "OCR Gate").len(), 2);
    assert!(log.lines().all(|line| line.split(';').nth(3) == Some("ms")));
    Ok(())
}

#[test]
fn test_batch_records_accepted_regions() -> anyhow::Result<()> {
    let input = tempfile::TempDir::new()?;
    let output = tempfile::TempDir::new()?;
    paragraph_image().save(input.path().join("sign.png"))?;

    let recognizer = Arc::new(FixedRecognizer::accepting());
    let shared: Arc<dyn TextRecognizer> = recognizer.clone();
    let detector = TextDetector::new(DetectorConfig::default(), Some(shared));
    let summary = run_batch(&detector, input.path(), output.path())?;

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.regions, 1);
    assert_eq!(recognizer.calls(), 1);
    assert!(output.path().join("sign_rects.png").is_file());
    Ok(())
}

#[test]
fn test_debug_dumps_keep_same_stem_images_apart() -> anyhow::Result<()> {
    let input = tempfile::TempDir::new()?;
    let output = tempfile::TempDir::new()?;
    let debug = tempfile::TempDir::new()?;
    write_blank_image(input.path(), "a.png", 70, 40);
    write_blank_image(input.path(), "a.bmp", 70, 40);

    let detector =
        TextDetector::new(DetectorConfig::default(), None).with_debug(debug.path().to_path_buf())?;
    let summary = run_batch(&detector, input.path(), output.path())?;

    assert_eq!(summary.processed, 2);
    for name in ["a.png", "a.bmp"] {
        assert!(debug.path().join(name).join("00_input").join("01.png").is_file());
        assert!(debug.path().join(name).join("07_ocr_gate").join("01.png").is_file());
    }
    assert!(output.path().join("a_masked.png").is_file());
    assert!(output.path().join("a_masked.bmp").is_file());
    Ok(())
}

#[test]
fn test_undecodable_image_stops_batch() -> anyhow::Result<()> {
    let input = tempfile::TempDir::new()?;
    let output = tempfile::TempDir::new()?;
    write_blank_image(input.path(), "a1.png", 70, 40);
    std::fs::write(input.path().join("a2.jpg"), b"definitely not a jpeg")?;
    write_blank_image(input.path(), "a3.png", 70, 40);

    let detector = TextDetector::new(DetectorConfig::default(), None);
    let result = run_batch(&detector, input.path(), output.path());

    match result {
        Err(BatchError::Decode { path, .. }) => assert!(path.ends_with("a2.jpg")),
        other => panic!("expected decode error, got {other:?}"),
    }
    assert!(output.path().join("a1_masked.png").is_file());
    assert!(!output.path().join("a3_masked.png").exists());
    Ok(())
}
