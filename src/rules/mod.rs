pub mod lifecycle;
pub mod validate;
