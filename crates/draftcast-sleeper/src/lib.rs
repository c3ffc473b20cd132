// Sleeper platform adapter.
//
// Implements the core's collaborator traits (`PickSource`, `CatalogSource`,
// `DraftDirectory`) on top of the public Sleeper REST API.

pub mod client;

pub use client::SleeperClient;
