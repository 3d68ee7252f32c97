pub mod content;

pub use content::generate_summary;
