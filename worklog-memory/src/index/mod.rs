//! In-memory retrieval indexes over the visible summary set

mod lexical;
mod vector;

pub use lexical::LexicalIndex;
pub use vector::VectorIndex;
