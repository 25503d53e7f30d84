pub mod barycentric;
