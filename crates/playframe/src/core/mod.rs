pub mod lifecycle;
pub mod window;
