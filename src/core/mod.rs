pub mod array;
pub mod backend;
pub mod poly;
pub mod scalar;
