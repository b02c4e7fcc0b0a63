// External HTTP services
pub mod instagram;
