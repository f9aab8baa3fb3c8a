//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod account;
pub mod charge;
pub mod invoice;
pub mod notification;
pub mod payment;
pub mod reset_token;
pub mod student;

// Re-export specific types to avoid conflicts
pub use account::{Column as AccountColumn, Entity as Account, Model as AccountModel};
pub use charge::{Column as ChargeColumn, Entity as Charge, Model as ChargeModel};
pub use invoice::{Column as InvoiceColumn, Entity as Invoice, Model as InvoiceModel};
pub use notification::{
    Column as NotificationColumn, Entity as Notification, Model as NotificationModel,
};
pub use payment::{Column as PaymentColumn, Entity as Payment, Model as PaymentModel};
pub use reset_token::{Column as ResetTokenColumn, Entity as ResetToken, Model as ResetTokenModel};
pub use student::{Column as StudentColumn, Entity as Student, Model as StudentModel};
