mod conv_blocks;
mod decoder_blocks;
mod geo_encoder;
mod heads;

pub use conv_blocks::*;
pub use decoder_blocks::*;
pub use geo_encoder::*;
pub use heads::*;
