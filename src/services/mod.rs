// Per-user carts
pub mod cart;

// Order placement and payment reconciliation
pub mod orders;

// Catalog
pub mod products;

// Accounts and logins
pub mod users;
