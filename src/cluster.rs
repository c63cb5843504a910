use crate::pivot::RowKey;

/// Horizontal layout of a clustered stacked-bar chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterLayout {
    /// One slot per row, in row order.
    pub slots: Vec<f64>,
    /// Axis value and label position of each cluster.
    pub labels: Vec<(String, f64)>,
    /// Empty slots between clusters.
    pub separators: Vec<f64>,
}

/// Lay out sorted rows as clusters, one per axis value, with one empty
/// slot between neighbouring clusters.
///
/// Each cluster is labelled at its center, `first_slot + (len - 1) / 2`.
pub fn cluster_layout(rows: &[RowKey]) -> ClusterLayout {
    let mut slots = Vec::with_capacity(rows.len());
    let mut labels = Vec::new();
    let mut separators = Vec::new();

    let mut position = 0.0;
    let mut group_start = 0.0;
    let mut group_len = 0usize;

    for (i, row) in rows.iter().enumerate() {
        let new_group = i == 0 || rows[i - 1].axis != row.axis;
        if new_group && i > 0 {
            labels.push((rows[i - 1].axis.clone(), center(group_start, group_len)));
            separators.push(position);
            position += 1.0;
        }
        if new_group {
            group_start = position;
            group_len = 0;
        }
        slots.push(position);
        group_len += 1;
        position += 1.0;
    }
    if let Some(last) = rows.last() {
        labels.push((last.axis.clone(), center(group_start, group_len)));
    }

    ClusterLayout { slots, labels, separators }
}

fn center(start: f64, len: usize) -> f64 {
    start + (len as f64 - 1.0) / 2.0
}
