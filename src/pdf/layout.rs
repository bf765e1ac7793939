/// Lower-left corner of a field widget, in PDF user space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldPosition {
    pub x: f32,
    pub y: f32,
}

impl FieldPosition {
    /// Used for fields without a widget; sorts after every placed field
    pub const UNPLACED: FieldPosition = FieldPosition {
        x: f32::INFINITY,
        y: f32::INFINITY,
    };
}

/// A field name paired with the position of its first widget
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEntry {
    pub name: String,
    pub position: FieldPosition,
}

/// Order field names by ascending y, then ascending x.
///
/// The sort is stable, so fields at identical positions keep their input
/// order. Only the first widget of a field is considered; a field spread
/// over several widgets is placed by the first one alone.
pub fn order_fields(mut entries: Vec<FieldEntry>, reverse: bool) -> Vec<String> {
    entries.sort_by(|a, b| {
        a.position
            .y
            .total_cmp(&b.position.y)
            .then(a.position.x.total_cmp(&b.position.x))
    });

    let mut names: Vec<String> = entries.into_iter().map(|e| e.name).collect();
    if reverse {
        names.reverse();
    }
    names
}
