pub mod content_loader;

pub use content_loader::{list_content_files, load_extracted_content};
