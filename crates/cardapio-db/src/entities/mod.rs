//! Database entities

pub mod category;
pub mod product;
pub mod user;

pub use category::Entity as Category;
pub use product::Entity as Product;
pub use user::Entity as User;

pub mod prelude {
    pub use super::category::Entity as Category;
    pub use super::product::Entity as Product;
    pub use super::user::Entity as User;
}
