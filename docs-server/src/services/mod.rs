//! Business logic behind the HTTP handlers

pub mod documents;

pub use documents::DocumentService;
