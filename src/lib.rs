pub mod disk;
pub mod fs;
pub mod logging;
pub mod shell;
pub mod utils;
