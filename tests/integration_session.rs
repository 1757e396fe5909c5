//! Integration tests for background sessions.

use image::{DynamicImage, ImageBuffer, Luma};
use photo_culler::core::pipeline::Pipeline;
use photo_culler::core::session::{AnalysisTask, SessionStatus, SessionStore};
use photo_culler::core::source::{ImageSource, InMemorySource};
use photo_culler::events::{Event, EventChannel, PipelineEvent};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn flat(value: u8) -> DynamicImage {
    DynamicImage::ImageLuma8(ImageBuffer::from_fn(16, 16, |_, _| Luma([value])))
}

#[test]
fn concurrent_sessions_finish_independently() {
    let store = Arc::new(SessionStore::new());
    let pipeline = Arc::new(Pipeline::builder().build().unwrap());
    let source = Arc::new(InMemorySource::new());
    let images = vec![
        source.insert_image("a.png", &flat(20)).unwrap(),
        source.insert_image("b.png", &flat(20)).unwrap(),
    ];

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let id = store.create().unwrap();
            let batch = if i % 2 == 0 { images.clone() } else { Vec::new() };
            let source: Arc<dyn ImageSource> = source.clone();
            AnalysisTask::spawn(Arc::clone(&store), id, Arc::clone(&pipeline), batch, source)
                .unwrap()
        })
        .collect();

    let ids: Vec<_> = handles.iter().map(|h| h.id()).collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), SessionStatus::Completed);
    }

    for (i, id) in ids.into_iter().enumerate() {
        let result = store.result(id).unwrap().unwrap();
        if i % 2 == 0 {
            assert!(result.success);
            assert_eq!(result.groups.len(), 1);
        } else {
            assert!(!result.success);
        }
    }
    assert_eq!(store.len(), 4);
}

#[test]
fn polling_sees_a_terminal_status() {
    let store = Arc::new(SessionStore::new());
    let id = store.create().unwrap();
    assert_eq!(store.status(id).unwrap(), SessionStatus::Pending);

    let source = Arc::new(InMemorySource::new());
    let images = vec![source.insert_image("a.png", &flat(1)).unwrap()];
    let handle = AnalysisTask::spawn(
        Arc::clone(&store),
        id,
        Arc::new(Pipeline::builder().build().unwrap()),
        images,
        source,
    )
    .unwrap();

    while !store.status(id).unwrap().is_terminal() {
        thread::sleep(Duration::from_millis(5));
    }
    assert!(store.result(id).unwrap().is_some());
    handle.join().unwrap();
}

#[test]
fn events_reach_subscriber_and_channel_closes() {
    let store = Arc::new(SessionStore::new());
    let id = store.create().unwrap();
    let source = Arc::new(InMemorySource::new());
    let images = vec![source.insert_image("a.png", &flat(50)).unwrap()];
    let (sender, receiver) = EventChannel::new();

    let handle = AnalysisTask::spawn_with_events(
        Arc::clone(&store),
        id,
        Arc::new(Pipeline::builder().build().unwrap()),
        images,
        source,
        sender,
    )
    .unwrap();

    // Iteration ends once the worker drops its sender
    let completed = receiver
        .iter()
        .filter(|e| matches!(e, Event::Pipeline(PipelineEvent::Completed { .. })))
        .count();
    assert_eq!(completed, 1);
    assert_eq!(handle.join().unwrap(), SessionStatus::Completed);
}

#[test]
fn finished_sessions_are_pruned() {
    let store = Arc::new(SessionStore::new());
    let finished = store.create().unwrap();
    let waiting = store.create().unwrap();

    AnalysisTask::spawn(
        Arc::clone(&store),
        finished,
        Arc::new(Pipeline::builder().build().unwrap()),
        Vec::new(),
        Arc::new(InMemorySource::new()),
    )
    .unwrap()
    .join()
    .unwrap();

    assert_eq!(store.prune_finished(chrono::Duration::hours(24)).unwrap(), 0);
    assert_eq!(store.prune_finished(chrono::Duration::seconds(-1)).unwrap(), 1);
    assert!(store.status(finished).is_err());
    assert_eq!(store.status(waiting).unwrap(), SessionStatus::Pending);
}
