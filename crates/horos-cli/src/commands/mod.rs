pub mod route;
pub mod serve;
pub mod target;
pub mod tool;
