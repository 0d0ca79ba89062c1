pub mod address_service;
pub mod cart_service;
pub mod catalog_service;

pub use address_service::{AddressInput, AddressService, AddressUpdate, AddressView};
pub use cart_service::{AddCartItemInput, CartLineView, CartService, CartView, UpdateCartItemInput};
pub use catalog_service::{
    AdminProductFilter, CatalogService, CategoryInput, CategoryUpdate, CategoryView,
    ProductFilter, ProductInput, ProductUpdate, ProductView,
};
