pub mod bug;
pub mod debug;
pub mod validation;
