pub mod commerce;
pub mod orders;
