pub mod manifest;
pub mod pipeline;
pub mod registry;
