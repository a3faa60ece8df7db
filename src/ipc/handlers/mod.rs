pub mod core;
pub mod editor;
pub mod exchange;
pub mod terms;
