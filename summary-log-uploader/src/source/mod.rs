pub mod folder;

pub use folder::FolderSource;
