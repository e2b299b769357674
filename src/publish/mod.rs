// file: src/publish/mod.rs
// description: publish module exports
// reference: internal module structure

pub mod sync;

pub use sync::{PublishOutcome, RemotePublisher};
