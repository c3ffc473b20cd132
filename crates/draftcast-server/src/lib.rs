// draftcast server: configuration and the viewer-facing WebSocket surface.

pub mod config;
pub mod ws_server;
