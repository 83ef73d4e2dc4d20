//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables backing the Credential Store,
//! Access Gate, Record Ledger and Department Counters.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod access_code;
pub mod department_counter;
pub mod record;
pub mod user;

// Re-export specific types to avoid conflicts
pub use access_code::{Column as AccessCodeColumn, Entity as AccessCode, Model as AccessCodeModel};
pub use department_counter::{
    Column as DepartmentCounterColumn, Entity as DepartmentCounter,
    Model as DepartmentCounterModel,
};
pub use record::{Column as RecordColumn, Entity as Record, Model as RecordModel};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
