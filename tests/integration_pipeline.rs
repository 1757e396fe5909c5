//! Integration tests for the analysis pipeline.
//!
//! These tests drive the public API end to end:
//! - The documented grouping scenarios in pixel and AI mode
//! - Partition and determinism over mixed batches
//! - Corrupt files and real files read from disk

use image::{DynamicImage, ImageBuffer, Luma, Rgb};
use photo_culler::core::comparator::GroupingStrategy;
use photo_culler::core::consolidator::GroupKind;
use photo_culler::core::pipeline::{AnalysisMode, AnalysisResult, Pipeline};
use photo_culler::core::scanner::WalkDirScanner;
use photo_culler::core::similarity::{Embedding, EmbeddingBackend};
use photo_culler::core::source::{FileSystemSource, ImageRef, InMemorySource};
use photo_culler::error::EmbeddingError;
use photo_culler::events::{CompareEvent, Event, EventChannel, MergeEvent};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn flat(value: u8) -> DynamicImage {
    DynamicImage::ImageLuma8(ImageBuffer::from_fn(24, 24, |_, _| Luma([value])))
}

fn gradient(offset: u8) -> DynamicImage {
    DynamicImage::ImageLuma8(ImageBuffer::from_fn(32, 32, |x, y| {
        Luma([((x * 4 + y * 3) as u8).wrapping_add(offset)])
    }))
}

fn checkerboard() -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_fn(32, 32, |x, y| {
        if (x / 4 + y / 4) % 2 == 0 {
            Rgb([250, 250, 250])
        } else {
            Rgb([5, 5, 5])
        }
    }))
}

fn sorted_indices(result: &AnalysisResult) -> Vec<usize> {
    let mut indices: Vec<usize> = result.groups.iter().flat_map(|g| g.indices()).collect();
    indices.sort_unstable();
    indices
}

/// Maps dark images to one direction and bright images to a direction 0.95 away
struct ToneBackend;

impl EmbeddingBackend for ToneBackend {
    fn name(&self) -> &'static str {
        "tone"
    }

    fn extract(&self, image: &DynamicImage) -> Result<Embedding, EmbeddingError> {
        let luma = image.to_luma8();
        let mean = luma.pixels().map(|p| p.0[0] as f64).sum::<f64>() / luma.len().max(1) as f64;
        if mean < 128.0 {
            Embedding::new(vec![1.0, 0.0])
        } else {
            Embedding::new(vec![0.95, 0.312_249_9])
        }
    }
}

#[test]
fn identical_images_form_one_duplicate_group() {
    let source = InMemorySource::new();
    let images: Vec<ImageRef> = (0..3)
        .map(|i| source.insert_image(format!("shot_{}.png", i), &gradient(7)).unwrap())
        .collect();
    let file_size = images[0].file_size;

    let result = Pipeline::builder().build().unwrap().analyze(&images, &source);

    assert!(result.success);
    assert_eq!(result.groups.len(), 1);
    let group = &result.groups[0];
    assert_eq!(group.kind, GroupKind::Duplicate);
    assert_eq!(group.id, "duplicate_0");
    assert_eq!(group.count, 3);
    assert_eq!(group.similarity_score, 0.98);
    assert_eq!(group.space_saved_bytes, 2 * file_size);
    assert_eq!(group.best_image.index, 0);

    let stats = result.statistics.unwrap();
    assert_eq!(stats.duplicate_count, 1);
    assert_eq!(stats.estimated_space_saved_bytes, 2 * file_size);
}

#[test]
fn unrelated_images_stay_unique() {
    let source = InMemorySource::new();
    let images = vec![
        source.insert_image("black.png", &flat(0)).unwrap(),
        source.insert_image("white.png", &flat(255)).unwrap(),
    ];

    let result = Pipeline::builder().build().unwrap().analyze(&images, &source);

    assert_eq!(result.groups.len(), 2);
    for (position, group) in result.groups.iter().enumerate() {
        assert_eq!(group.kind, GroupKind::Unique);
        assert_eq!(group.id, format!("unique_{}", position));
        assert_eq!(group.similarity_score, 1.0);
        assert_eq!(group.space_saved_bytes, 0);
    }
    assert_eq!(result.statistics.unwrap().unique_count, 2);
}

#[test]
fn single_image_needs_no_comparisons() {
    let source = InMemorySource::new();
    let images = vec![source.insert_image("only.png", &gradient(0)).unwrap()];
    let (sender, receiver) = EventChannel::new();

    let result = Pipeline::builder()
        .build()
        .unwrap()
        .analyze_with_events(&images, &source, &sender);
    drop(sender);

    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.groups[0].kind, GroupKind::Unique);

    let comparisons: Vec<usize> = receiver
        .iter()
        .filter_map(|e| match e {
            Event::Compare(CompareEvent::Completed { comparisons, .. }) => Some(comparisons),
            _ => None,
        })
        .collect();
    assert_eq!(comparisons, vec![0]);
}

/// Rejects every image, as a backend with a missing model would
struct BrokenBackend;

impl EmbeddingBackend for BrokenBackend {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn extract(&self, _image: &DynamicImage) -> Result<Embedding, EmbeddingError> {
        Err(EmbeddingError::Backend {
            backend: "broken",
            reason: "model not loaded".to_string(),
        })
    }
}

#[test]
fn ai_mode_survives_a_failing_backend() {
    let source = InMemorySource::new();
    let images = vec![
        source.insert_image("dark_a.png", &flat(10)).unwrap(),
        source.insert_image("dark_b.png", &flat(10)).unwrap(),
        source.insert_image("bright.png", &flat(240)).unwrap(),
    ];
    let (sender, receiver) = EventChannel::new();

    let result = Pipeline::builder()
        .mode(AnalysisMode::Ai)
        .backend(Arc::new(BrokenBackend))
        .build()
        .unwrap()
        .analyze_with_events(&images, &source, &sender);
    drop(sender);

    assert!(result.success);
    assert!(result.error.is_none());
    assert_eq!(result.groups.len(), 2);
    assert_eq!(result.groups[0].kind, GroupKind::Similar);
    assert_eq!(result.groups[0].similarity_score, 0.98);
    assert_eq!(result.groups[1].kind, GroupKind::Unique);

    let failures = receiver
        .iter()
        .filter(|event| matches!(event, Event::Merge(MergeEvent::EmbeddingFailed { .. })))
        .count();
    assert_eq!(failures, 2);
}

#[test]
fn ai_mode_merges_groups_with_close_embeddings() {
    let source = InMemorySource::new();
    let images = vec![
        source.insert_image("dark_a.png", &flat(10)).unwrap(),
        source.insert_image("dark_b.png", &flat(10)).unwrap(),
        source.insert_image("bright_a.png", &flat(240)).unwrap(),
        source.insert_image("bright_b.png", &flat(240)).unwrap(),
    ];

    let pixel = Pipeline::builder().build().unwrap().analyze(&images, &source);
    assert_eq!(pixel.groups.len(), 2);

    let ai = Pipeline::builder()
        .mode(AnalysisMode::Ai)
        .backend(Arc::new(ToneBackend))
        .build()
        .unwrap()
        .analyze(&images, &source);

    assert_eq!(ai.groups.len(), 1);
    let group = &ai.groups[0];
    assert_eq!(group.kind, GroupKind::Similar);
    assert_eq!(group.id, "similar_0");
    assert_eq!(group.count, 4);
    assert!((group.similarity_score - 0.95).abs() < 1e-4);
    assert_eq!(ai.statistics.unwrap().similar_count, 1);
}

#[test]
fn ai_mode_respects_similarity_threshold() {
    let source = InMemorySource::new();
    let images = vec![
        source.insert_image("dark.png", &flat(10)).unwrap(),
        source.insert_image("bright.png", &flat(240)).unwrap(),
    ];

    let result = Pipeline::builder()
        .mode(AnalysisMode::Ai)
        .similarity_threshold(0.99)
        .backend(Arc::new(ToneBackend))
        .build()
        .unwrap()
        .analyze(&images, &source);

    assert_eq!(result.groups.len(), 2);
    assert!(result.groups.iter().all(|g| g.kind == GroupKind::Unique));
}

#[test]
fn empty_batch_returns_error_payload() {
    let result = Pipeline::builder()
        .build()
        .unwrap()
        .analyze(&[], &InMemorySource::new());

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("No valid image paths found"));
    assert!(result.groups.is_empty());

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["success"], serde_json::json!(false));
    assert_eq!(json["groups"], serde_json::json!([]));
    assert_eq!(json["statistics"], serde_json::json!({}));
}

#[test]
fn groups_partition_the_batch() {
    let source = InMemorySource::new();
    let rasters = [
        gradient(0),
        flat(30),
        gradient(0),
        checkerboard(),
        flat(30),
        gradient(120),
    ];
    let mut images: Vec<ImageRef> = rasters
        .iter()
        .enumerate()
        .map(|(i, img)| source.insert_image(format!("{}.png", i), img).unwrap())
        .collect();
    images.push(source.insert_bytes("broken.png", b"definitely not a png".to_vec()));

    for grouping in [GroupingStrategy::SeedOnly, GroupingStrategy::Transitive] {
        for mode in [AnalysisMode::Pixel, AnalysisMode::Ai] {
            let result = Pipeline::builder()
                .mode(mode)
                .grouping(grouping)
                .build()
                .unwrap()
                .analyze(&images, &source);

            assert_eq!(sorted_indices(&result), (0..images.len()).collect::<Vec<_>>());
            assert_eq!(result.total_images(), images.len());
        }
    }
}

#[test]
fn best_image_has_highest_score() {
    let source = InMemorySource::new();
    let images = vec![
        source.insert_image("a.png", &gradient(0)).unwrap(),
        source.insert_image("b.png", &gradient(0)).unwrap(),
        source.insert_image("c.png", &checkerboard()).unwrap(),
    ];

    let result = Pipeline::builder().build().unwrap().analyze(&images, &source);

    for group in &result.groups {
        for member in &group.images {
            assert!(group.best_image.quality.overall_score >= member.quality.overall_score);
            if member.quality.overall_score == group.best_image.quality.overall_score {
                assert!(group.best_image.index <= member.index);
            }
        }
    }
}

#[test]
fn repeated_runs_are_identical() {
    let source = InMemorySource::new();
    let rasters = [gradient(3), checkerboard(), gradient(3), flat(200), flat(200)];
    let images: Vec<ImageRef> = rasters
        .iter()
        .enumerate()
        .map(|(i, img)| source.insert_image(format!("{}.png", i), img).unwrap())
        .collect();
    let pipeline = Pipeline::builder().mode(AnalysisMode::Ai).build().unwrap();

    let first = serde_json::to_value(&pipeline.analyze(&images, &source).groups).unwrap();
    for _ in 0..3 {
        let again = serde_json::to_value(&pipeline.analyze(&images, &source).groups).unwrap();
        assert_eq!(first, again);
    }
}

#[test]
fn corrupt_image_becomes_its_own_group() {
    let source = InMemorySource::new();
    let images = vec![
        source.insert_image("good.png", &gradient(0)).unwrap(),
        source.insert_bytes("corrupt.jpg", b"this is not a valid image file".to_vec()),
        source.insert_image("good_copy.png", &gradient(0)).unwrap(),
    ];

    // Should not panic - decode errors are captured, not fatal
    let result = Pipeline::builder().build().unwrap().analyze(&images, &source);

    assert!(result.success);
    assert_eq!(result.groups.len(), 2);
    assert_eq!(result.groups[0].indices().collect::<Vec<_>>(), vec![0, 2]);

    let corrupt = &result.groups[1];
    assert_eq!(corrupt.kind, GroupKind::Unique);
    assert_eq!(corrupt.best_image.path, "corrupt.jpg");
    assert_eq!(corrupt.best_image.quality.overall_score, 0.0);
}

#[test]
fn analyzes_files_scanned_from_disk() {
    let temp_dir = TempDir::new().unwrap();
    gradient(0).save(temp_dir.path().join("a.png")).unwrap();
    checkerboard().save(temp_dir.path().join("b.png")).unwrap();
    gradient(0).save(temp_dir.path().join("c.png")).unwrap();
    fs::write(temp_dir.path().join("notes.txt"), "not a photo").unwrap();

    let scan = WalkDirScanner::default().scan(&[temp_dir.path().to_path_buf()]);
    assert_eq!(scan.images.len(), 3);

    let result = Pipeline::builder()
        .build()
        .unwrap()
        .analyze(&scan.images, &FileSystemSource::new());

    assert_eq!(result.groups.len(), 2);
    let duplicate = &result.groups[0];
    assert_eq!(duplicate.kind, GroupKind::Duplicate);
    assert!(duplicate.best_image.path.ends_with("a.png"));
    assert!(duplicate.images[1].path.ends_with("c.png"));
    assert_eq!(result.groups[1].kind, GroupKind::Unique);
}
