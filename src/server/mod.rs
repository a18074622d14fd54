pub mod map_server;
pub use map_server::{MapServer, NavigationContext};

pub mod outbox;
pub mod requests;
