pub mod api;
pub mod default;
pub mod reverse_proxy;
pub mod web;
pub mod websocket_proxy;
