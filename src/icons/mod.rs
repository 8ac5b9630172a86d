pub mod image;
pub mod rules;
