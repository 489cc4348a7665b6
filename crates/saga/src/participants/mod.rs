//! The three business participants of the order saga.

pub mod inventory;
pub mod payment;
pub mod product_validation;

pub use inventory::{
    Decrement, InMemoryStockStore, InventoryAdjustment, InventoryService, LineAdjustment,
    StockStore,
};
pub use payment::{Payment, PaymentConfig, PaymentService, PaymentStatus};
pub use product_validation::{
    InMemoryProductCatalog, ProductCatalog, ProductValidationService, Validation,
};
