pub mod chart;
pub mod conversation;
pub mod response;
pub mod schema;
pub mod table;

pub use chart::*;
pub use conversation::*;
pub use response::*;
pub use schema::*;
pub use table::*;
