pub mod pick;
pub mod state;
