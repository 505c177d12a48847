pub mod beer;
pub mod beers_info;

pub use beer::Beer;
pub use beers_info::BeersInfo;
