pub mod generate;
pub mod map;
pub mod markers;
pub mod popup;
