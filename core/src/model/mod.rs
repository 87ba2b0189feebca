// core/src/model/mod.rs

//! Domain types shared by the engine, the stores and the HTTP layer.

pub mod analytics;
pub mod live;
pub mod money;
pub mod order;
pub mod page;
pub mod principal;

pub use analytics::OrderAnalytics;
pub use live::{LiveEventKind, LiveMessage, LivePayload, OrderUpdate};
pub use money::{money_fits, money_limit, Money, MONEY_INTEGER_DIGITS, MONEY_SCALE};
pub use order::{
  NewOrder, NewOrderItem, Order, OrderItem, OrderStatus, OrderStatusHistory, OrderWithItems, PaymentStatus,
  UpdateStatusRequest, PAYMENT_HISTORY_LABEL,
};
pub use page::{Page, PageQuery};
pub use principal::{Principal, Role, TokenRecord};
