//! Shared page geometry resolution for uniform sizing.

use crate::types::{SizePolicy, TargetSize};

/// Derives one page size from a sample of image sizes.
///
/// # Arguments
///
/// * `sample` - Sizes of the decodable images among the first members of a collection,
///   in natural order
/// * `policy` - How to combine them
///
/// # Returns
///
/// * `Option<TargetSize>` - The shared size, or `None` when the sample is empty and the
///   policy depends on it. `Fixed` never depends on the sample.
pub fn resolve(sample: &[TargetSize], policy: SizePolicy) -> Option<TargetSize> {
    if let SizePolicy::Fixed(width, height) = policy {
        return Some(TargetSize::new(width, height));
    }
    let first = *sample.first()?;

    match policy {
        SizePolicy::Max => Some(sample.iter().fold(first, |acc, s| {
            TargetSize::new(acc.width.max(s.width), acc.height.max(s.height))
        })),
        SizePolicy::Min => Some(sample.iter().fold(first, |acc, s| {
            TargetSize::new(acc.width.min(s.width), acc.height.min(s.height))
        })),
        SizePolicy::Auto => Some(most_frequent(sample)),
        SizePolicy::Fixed(..) => unreachable!("fixed sizes return early"),
    }
}

/// Mode of the sample. Counts keep first-seen order so that ties resolve to the
/// size encountered first.
fn most_frequent(sample: &[TargetSize]) -> TargetSize {
    let mut counts: Vec<(TargetSize, usize)> = Vec::new();
    for size in sample {
        match counts.iter_mut().find(|(seen, _)| seen == size) {
            Some((_, count)) => *count += 1,
            None => counts.push((*size, 1)),
        }
    }

    let mut best = counts[0];
    for &candidate in &counts[1..] {
        if candidate.1 > best.1 {
            best = candidate;
        }
    }
    best.0
}
