//! Upstream rate sources

pub mod national_bank;
pub mod open_er_api;
pub mod util;

pub use national_bank::NationalBankProvider;
pub use open_er_api::OpenErApiProvider;
