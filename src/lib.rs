pub mod data;
pub mod feed;
pub mod logging;
pub mod pipeline;
pub mod server;
pub mod state;
pub mod view;
