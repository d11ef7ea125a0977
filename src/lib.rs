pub mod config;
pub mod exporter;
pub mod pipeline;
pub mod prompts;
pub mod providers;
pub mod reconciler;
pub mod recovery;
pub mod resolver;
pub mod store;
pub mod tree;
