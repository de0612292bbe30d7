/// Difficulty labels as displayed by the trail site, easiest access first.
/// A label's ordinal is its 1-based position in this list.
pub const DIFFICULTY_LABELS: [&str; 9] = [
    "Access Road/Trail",
    "Easiest / White Circle",
    "Easy / Green Circle",
    "Intermediate / Blue Square",
    "Very Difficult / Black Diamond",
    "Extremely Difficult / Double Black Diamond",
    "Pro Line / Double Black Diamond Pro",
    "Secondary Access Road/Trail",
    "Chairlifts & gondolas",
];

/// Ordinal (1..=9) of an exact difficulty label, `None` for anything else.
pub fn difficulty_code(label: &str) -> Option<u8> {
    let label = label.trim();
    DIFFICULTY_LABELS
        .iter()
        .position(|known| *known == label)
        .map(|i| i as u8 + 1)
}

pub fn difficulty_label(code: u8) -> Option<&'static str> {
    DIFFICULTY_LABELS.get((code as usize).checked_sub(1)?).copied()
}
