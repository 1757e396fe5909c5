//! # Events Module
//!
//! Progress reporting for long-running analyses.
//!
//! ## Design
//! The engine emits events through channels so any front end (CLI, an HTTP
//! status endpoint, a GUI) can subscribe without the core knowing about it.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         if let Event::Quality(QualityEvent::Progress(p)) = event {
//!             println!("Scored {}/{}", p.completed, p.total);
//!         }
//!     }
//! });
//!
//! let result = pipeline.analyze_with_events(&images, &source, &sender);
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;
