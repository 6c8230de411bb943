pub mod formatter;

pub use formatter::{
    format_amenity, format_health, format_outcome, format_penalty, format_quota, format_rating,
    format_score, format_tsv, should_use_colors,
};
