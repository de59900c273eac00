//! File-facing services used by the processor

pub mod io;
pub mod sniff;

pub use io::ImageIOService;
pub use sniff::{TypeSniffer, ALLOWED_EXTENSIONS};
