pub mod builder;
pub mod compiler;
pub mod config;
pub mod document;
pub mod error;
pub mod fragments;
pub mod helpers;
pub mod output;
pub mod scanner;

// Re-export main types
pub use builder::{BuildReport, Builder, PageFailure, build_site};
pub use compiler::{CompiledTemplate, Compiler, Layout};
pub use config::BuildConfig;
pub use document::TemplateDocument;
pub use error::BuildError;
pub use fragments::FragmentRegistry;
pub use scanner::{SiteScanner, SourceFile, SourceKind};
