//=========================================================================
// Visibility
//=========================================================================
//
// Show-type rule deciding which stack entries are displayed.
//
// Scan top → bottom:
//   every scanned entry is visible
//   FullScreen  stops the scan
//   Single      keeps the bottom `background_count` entries visible, stops
//   Addition    continues
//
// Entries not marked are hidden. Entries still loading (`None`) are
// skipped and reported hidden.
//
//=========================================================================

use super::descriptor::ShowType;

/// Computes visibility for a stack given bottom → top show types.
pub fn compute_visibility(show_types: &[Option<ShowType>], background_count: usize) -> Vec<bool> {
    let mut visible = vec![false; show_types.len()];

    for index in (0..show_types.len()).rev() {
        let Some(show_type) = show_types[index] else {
            continue;
        };
        visible[index] = true;

        match show_type {
            ShowType::FullScreen => break,
            ShowType::Single => {
                let backgrounds = background_count.min(show_types.len());
                for (slot, show) in visible.iter_mut().zip(show_types).take(backgrounds) {
                    if show.is_some() {
                        *slot = true;
                    }
                }
                break;
            }
            ShowType::Addition => {}
        }
    }

    visible
}

//=========================================================================
// Tests
//=========================================================================
