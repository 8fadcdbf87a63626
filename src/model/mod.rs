pub mod core_data;
pub mod issue;

pub use core_data::CoreData;
pub use issue::Issue;
