//! Built-in plugins.

pub mod example;
pub mod inventory;

pub use example::ExamplePlugin;
pub use inventory::InventoryPlugin;
