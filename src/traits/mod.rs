//! Model capability traits

mod capability;
mod embedding;
mod image;
mod language;
mod model;

pub use capability::*;
pub use embedding::EmbeddingModel;
pub use image::ImageModel;
pub use language::LanguageModel;
pub use model::ModelRef;
