//! Entities owned by collaborating services and read by the game core.

pub mod dungeon;
pub mod hero;
pub mod item;

pub use dungeon::{Dungeon, Monster, Room};
pub use hero::{Hero, HeroClass, MAX_INVENTORY_SLOTS};
pub use item::{InventoryEntry, Item};
