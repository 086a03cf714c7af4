//! File I/O for produced documents.

pub mod writer;

pub use writer::ScratchWriter;
