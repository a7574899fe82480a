//! Domain value types shared by entities and services.

pub mod cart;

pub use cart::CartData;
