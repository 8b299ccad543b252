pub mod engine;
pub mod error;
pub mod processor;
pub mod route;
pub mod sitemap;

pub use engine::Engine;
pub use error::EngineError;
pub use processor::ContentProcessor;
pub use route::derive_route;
