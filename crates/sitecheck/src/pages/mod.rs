//! Page objects for the served site.

mod index;

pub use index::{IndexPage, IndexPageBuilder};
