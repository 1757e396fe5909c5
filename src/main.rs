//! # photo-cull
//!
//! Command-line front end for the photo culling engine.
//!
//! ## Usage
//! ```bash
//! photo-cull analyze ~/Photos
//! photo-cull analyze ~/Photos --mode ai --output json
//! ```

mod cli;

use photo_culler::Result;

fn main() -> Result<()> {
    photo_culler::init_tracing();
    cli::run()
}
