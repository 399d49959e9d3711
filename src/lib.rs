pub mod config;
pub mod dom;
pub mod dropdown;
pub mod error;
pub mod export;
pub mod extract;
pub mod harvest;
pub mod import;
pub mod model;
pub mod normalize;
pub mod report;
pub mod snapshot;
pub mod store;
