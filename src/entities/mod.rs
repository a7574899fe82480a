pub mod order;
pub mod product;
pub mod user;

pub use order::{OrderItem, OrderItems, PaymentMethod};
pub use product::StringList;
