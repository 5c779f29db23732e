pub mod api_keys;
pub mod credits;
pub mod jobs;
pub mod paginator;
pub mod repository;
pub mod transactions;
pub mod uploads;

pub use api_keys::ApiKeys;
pub use credits::Credits;
pub use jobs::Jobs;
pub use paginator::Paginator;
pub use repository::PagedResource;
pub use transactions::Transactions;
pub use uploads::Uploads;
