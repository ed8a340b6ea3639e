pub mod grouping;
pub mod naming;
pub mod nfo;

pub use grouping::{group_media_files, GroupingRules, MediaFile, MediaGroup};
pub use nfo::{parse_nfo, NfoInfo};
