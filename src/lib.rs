pub mod config;
pub mod error;
pub mod events;
pub mod gallery;
pub mod geometry;
pub mod mappers;
pub mod progress {
    pub mod chapters;
    pub mod tracker;
}
pub mod reveal;
pub mod schedule;
pub mod simulate;
pub mod stage;
pub mod tasks {
    pub mod driver;
    pub mod loader;
}
