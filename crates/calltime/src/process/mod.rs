mod attach;

pub use attach::{ProcessInfo, find_process_by_name};
