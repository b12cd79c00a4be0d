pub mod draft_coordinator;

pub use draft_coordinator::DraftCoordinator;
