//! Neural network building blocks for the implicit scene field.

mod encoding;
mod mlp;

pub use encoding::PositionEncoding;
pub use mlp::{Mlp, MlpConfig};
