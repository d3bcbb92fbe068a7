pub mod billing;
pub mod consumption;
pub mod usage;
pub mod window;
