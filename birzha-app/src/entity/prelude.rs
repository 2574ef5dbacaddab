pub use super::message::Entity as Message;
pub use super::user::Entity as User;
