// Library root: the draft-synchronization loop and recommendation engine.
//
// Everything platform-specific (the upstream REST client, the viewer
// transport) lives in sibling crates and plugs in through the traits in
// `source` and the channels in `registry`.

pub mod catalog;
pub mod draft;
pub mod protocol;
pub mod recommend;
pub mod registry;
pub mod source;
pub mod tracker;

#[cfg(test)]
pub(crate) mod test_helpers;
