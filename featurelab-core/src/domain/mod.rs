//! Domain types shared by the feature and indicator stages.

pub mod bar;

pub use bar::Bar;
