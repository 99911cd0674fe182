//! Migration Content Parser - splitting a file into up and down bodies
//!
//! A migration file holds both directions:
//!
//! ```sql
//! -- migration:up
//! CREATE TABLE users (id INTEGER PRIMARY KEY);
//!
//! -- migration:down
//! DROP TABLE users;
//! ```
//!
//! Markers are matched anywhere in the text. The marker lines themselves
//! belong to neither body.

use tracing::debug;

use super::definitions::{MigrationDirection, DOWN_MARKER, UP_MARKER};

/// Extract the body for `direction` from a migration file's text
///
/// * `Up`: the text after the up marker, ending at the down marker if one
///   follows it. Without an up marker the body is empty, even when the file
///   has a down section.
/// * `Down`: the text after the down marker. Without a down marker the body
///   is empty.
pub fn extract_body(text: &str, direction: MigrationDirection) -> String {
    let up = text.find(UP_MARKER);
    let down = text.find(DOWN_MARKER);
    debug!(
        ?direction,
        has_up = up.is_some(),
        has_down = down.is_some(),
        "Extracting migration body"
    );

    match direction {
        MigrationDirection::Up => match up {
            Some(start) => {
                let body_start = start + UP_MARKER.len();
                let body_end = match down {
                    Some(end) if end >= body_start => end,
                    _ => text.len(),
                };
                text[body_start..body_end].to_string()
            }
            None => String::new(),
        },
        MigrationDirection::Down => match down {
            Some(start) => text[start + DOWN_MARKER.len()..].to_string(),
            None => String::new(),
        },
    }
}
