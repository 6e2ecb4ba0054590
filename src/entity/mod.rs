pub mod categories;
pub mod order_items;
pub mod orders;
pub mod products;
pub mod user_profiles;

pub use categories::Entity as Categories;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use products::Entity as Products;
pub use user_profiles::Entity as UserProfiles;
