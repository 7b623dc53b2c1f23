use slicemark::model::{AnnotationRef, StructureKind};

const MAX_LABEL_LEN: usize = 32;

/// One-based position for display, e.g. `Slice 3 / 20`.
pub fn slice_position(current: usize, len: usize) -> String {
    if len == 0 {
        return String::from("No slices");
    }
    format!("Slice {} / {len}", current.min(len - 1) + 1)
}

/// Collapses ascending zero-based indices into one-based runs: `1-3, 5`.
pub fn slice_runs(indices: &[usize]) -> String {
    let mut runs: Vec<(usize, usize)> = Vec::new();
    for &index in indices {
        match runs.last_mut() {
            Some((_, end)) if *end + 1 == index => *end = index,
            _ => runs.push((index, index)),
        }
    }
    runs.iter()
        .map(|&(start, end)| {
            if start == end {
                format!("{}", start + 1)
            } else {
                format!("{}-{}", start + 1, end + 1)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// List entry for an annotation: its label, or kind and id when unlabeled.
pub fn annotation_title(target: AnnotationRef, kind: StructureKind, label: &str) -> String {
    let label = label.trim();
    if label.is_empty() {
        return match target {
            AnnotationRef::Structure(id) => format!("{} {id}", kind.as_str()),
            AnnotationRef::Legacy { id, .. } => format!("{} {id} (legacy)", kind.as_str()),
        };
    }
    if label.chars().count() > MAX_LABEL_LEN {
        let mut truncated = label.chars().take(MAX_LABEL_LEN).collect::<String>();
        truncated.push('…');
        truncated
    } else {
        label.to_string()
    }
}

pub fn percent(value: f64) -> String {
    format!("{:.0}%", value * 100.0)
}
