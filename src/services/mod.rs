//! Services that keep I/O out of the filtering logic

pub mod io;

pub use io::ImageIOService;
