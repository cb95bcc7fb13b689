pub mod api;
pub mod azure;
pub mod badge;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod server;
pub mod shutdown;
pub mod store;
pub mod urls;
pub mod view;

#[cfg(test)]
pub(crate) mod test_support;
