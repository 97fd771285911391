pub mod extraction_ctx;
pub mod extraction_flow;

pub use extraction_ctx::ExtractionCtx;
pub use extraction_flow::{product_instruction, repair_prompt, ExtractionFlow};
