pub mod bill;
pub mod dialogue;
pub mod plan;
pub mod subscription;

pub use bill::{user_from_bill_id, BillStatus, PaymentBill};
pub use dialogue::{PendingPayment, Stage};
pub use plan::{Plan, UNLIMITED_DAYS};
pub use subscription::UserSubscription;
