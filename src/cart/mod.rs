//! Local shopping cart: purchase rules plus whole-collection persistence
//! through a byte-oriented storage port. No network access happens here.

mod item;
mod storage;
mod store;

pub use item::{CartItem, NewCartItem};
pub use storage::{CartStorage, FileStorage, MemoryStorage, StorageError};
pub use store::{CART_STORAGE_KEY, CartStore, renormalize};
