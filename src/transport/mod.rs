/// Filesystem and archive transports for filing discovery.
pub mod fs;
