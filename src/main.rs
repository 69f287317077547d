use colored::*;
use sectorfs::{logging, shell::start_shell};

fn main() {
    logging::init();
    if let Err(e) = start_shell() {
        eprintln!("{} {}", "❌ SectorFS failed to start:".red().bold(), e);
        std::process::exit(1);
    }
}
