pub mod core;
pub mod i18n;
pub mod models;
pub mod plugins;
pub mod theme;
pub mod utils;

// Re-export commonly used types
pub use crate::core::{ContentProcessor, Engine, EngineError};
pub use crate::models::{BuildResult, BuildStatus, Config, ContentFile};
pub use crate::plugins::{PageContext, Plugin, PluginError, PluginManager};
pub use crate::theme::{LayoutKind, Renderer, Theme, ThemeError, ThemeResolver};
