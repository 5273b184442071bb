pub mod blocks;
pub mod frontmatter;
pub mod sections;

pub use blocks::split_blocks;
pub use sections::{split_sections, Section};
