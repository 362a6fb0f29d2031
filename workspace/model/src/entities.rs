//! This file serves as the root for all SeaORM entity modules.
//! Users own categories, transactions, budgets and notifications;
//! every query outside of user management is scoped by `user_id`.

pub mod budget;
pub mod category;
pub mod notification;
pub mod transaction;
pub mod user;

pub use notification::NotificationKind;
pub use transaction::TransactionKind;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::budget::Entity as Budget;
    pub use super::category::Entity as Category;
    pub use super::notification::Entity as Notification;
    pub use super::transaction::Entity as Transaction;
    pub use super::user::Entity as User;
}
