//! Image pipeline: decode, constrain, zone stamp overlay, and JPEG data-URI encoding.

mod pipeline;
mod stamp;

pub use pipeline::{
    JPEG_QUALITY, MAX_DIMENSION, PipelineError, PipelineOutput, StampPipeline, load_font,
};
pub use stamp::StampStyle;
