pub mod instances;
pub mod upload;

pub use instances::GymApi;
