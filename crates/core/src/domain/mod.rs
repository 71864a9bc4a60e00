pub mod product;
pub mod purchase;
pub mod stock;
pub mod window;
