pub mod store;

pub use store::FsPackageStorage;
