pub mod bindings;
pub mod gallery;

pub use gallery::Gallery;
