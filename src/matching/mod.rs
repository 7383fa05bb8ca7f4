pub mod fame;
pub mod geo;
pub mod orientation;
pub mod pipeline;

pub use fame::fame_rating;
pub use geo::distance_between;
pub use orientation::is_compatible;
pub use pipeline::{browse, BrowseInput, BrowsePage, BrowseQuery, GenderMode, SortField, SortOrder};
