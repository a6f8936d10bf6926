pub mod container;
pub mod registry;
pub mod status;
pub mod task;
pub mod tracker;

pub use registry::Registry;
