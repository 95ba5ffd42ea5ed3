mod scan;

pub use scan::{scan, ScanParams};
