//! Request, response and stream types shared by models and the retry layer

/// Copy every `Some` field of an overrides struct onto the matching `Option` field.
macro_rules! override_fields {
    ($target:expr, $overrides:expr; $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = &$overrides.$field {
                $target.$field = Some(value.clone());
            }
        )+
    };
}

mod common;
mod embedding;
mod image;
mod language;
mod stream;

pub use common::*;
pub use embedding::*;
pub use image::*;
pub use language::*;
pub use stream::*;
