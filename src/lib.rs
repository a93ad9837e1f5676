//! Organize a folder of MP3 downloads: tags from filenames, Discogs cover
//! art, and artist folders in a library.

pub mod artwork;
pub mod commands;
pub mod finder;
pub mod logging;
pub mod progress;
pub mod prompt;
pub mod relocate;
pub mod settings;
pub mod tagger;
pub mod uploads;
