//! Templates, candidates and the 1:N gallery lifecycle

pub mod gallery;
pub mod types;

pub use gallery::{rank_candidates, GalleryLifecycle, GalleryState};
