//! Strategies command implementation

use crate::predict::registry;

pub fn run() {
    println!("{:<12} {:<12} {}", "Key", "Name", "Description");
    println!("{}", "-".repeat(72));

    for strategy in registry() {
        println!(
            "{:<12} {:<12} {}",
            strategy.kind().key(),
            strategy.name(),
            strategy.description()
        );
    }
}
