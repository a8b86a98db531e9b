//! Merges persisted gallery rows with pending images.
//!
//! Persisted and pending images form one combined set for ordering and for the
//! feature flag: at most one image in the union is the feature, and a
//! non-empty union has exactly one once settled.

use crate::error::{GalleryError, Result};
use crate::pending::MAX_DISPLAY_ORDER;
use crate::types::{GalleryEntry, GalleryImage, NewGalleryImage, PendingImage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Persisted(usize),
    Pending(usize),
}

/// One creation record together with the pending entry it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveItem {
    pub local_id: String,
    pub record: NewGalleryImage,
}

/// `max(order) + 1` over both collections, 1 when both are empty.
///
/// `None` once the highest order has reached [`MAX_DISPLAY_ORDER`].
pub fn next_display_order(persisted: &[GalleryImage], pending: &[PendingImage]) -> Option<i32> {
    let highest = persisted
        .iter()
        .map(|img| img.display_order)
        .chain(pending.iter().map(|img| img.display_order))
        .max()
        .unwrap_or(0);
    highest.checked_add(1).filter(|next| *next <= MAX_DISPLAY_ORDER)
}

pub fn feature_count(persisted: &[GalleryImage], pending: &[PendingImage]) -> usize {
    persisted.iter().filter(|img| img.is_feature).count()
        + pending.iter().filter(|img| img.is_feature).count()
}

/// Make `id` the only feature across both collections.
///
/// Returns the ids of persisted rows whose flag changed.
pub fn set_feature(
    persisted: &mut [GalleryImage],
    pending: &mut [PendingImage],
    id: &str,
) -> Result<Vec<String>> {
    let target = find(persisted, pending, id).ok_or_else(|| GalleryError::NotFound(id.to_string()))?;
    Ok(apply_feature(persisted, pending, target))
}

/// Sort freshly loaded rows by order and repair the feature flag
pub fn enforce_single_feature_on_load(mut images: Vec<GalleryImage>) -> Vec<GalleryImage> {
    images.sort_by_key(|img| img.display_order);
    enforce_single_feature(&mut images);
    images
}

/// Repair persisted rows already sorted by order; returns ids whose flag changed
pub fn enforce_single_feature(images: &mut [GalleryImage]) -> Vec<String> {
    let mut changed = Vec::new();
    match images.iter().position(|img| img.is_feature) {
        None => {
            if let Some(first) = images.first_mut() {
                first.is_feature = true;
                changed.push(first.id.clone());
            }
        }
        Some(keep) => {
            for (idx, img) in images.iter_mut().enumerate() {
                if idx != keep && img.is_feature {
                    img.is_feature = false;
                    changed.push(img.id.clone());
                }
            }
        }
    }
    changed
}

/// Bring the combined set back to exactly one feature.
///
/// No feature: the first image by order is promoted (persisted wins ties).
/// Several: a persisted feature is kept over a pending one, lowest order first.
/// Returns the ids of persisted rows whose flag changed.
pub fn settle_feature(persisted: &mut [GalleryImage], pending: &mut [PendingImage]) -> Vec<String> {
    match feature_count(persisted, pending) {
        0 => match first_by_order(persisted, pending, |_| true, |_| true) {
            Some(slot) => apply_feature(persisted, pending, slot),
            None => Vec::new(),
        },
        1 => Vec::new(),
        _ => {
            let keep = first_by_order(persisted, pending, |img| img.is_feature, |_| false)
                .or_else(|| first_by_order(persisted, pending, |_| false, |img| img.is_feature));
            match keep {
                Some(slot) => apply_feature(persisted, pending, slot),
                None => Vec::new(),
            }
        }
    }
}

/// Turn every resolved pending entry into a creation record, in display order.
///
/// Entries without an upload URL block the whole save. If nothing in the
/// combined set is featured, the lowest-order record is promoted.
pub fn build_save_payload(
    project_id: &str,
    persisted: &[GalleryImage],
    pending: &[PendingImage],
) -> Result<Vec<SaveItem>> {
    let unresolved = pending.iter().filter(|img| !img.is_resolved()).count();
    if unresolved > 0 {
        return Err(GalleryError::StillUploading { count: unresolved });
    }

    let mut items: Vec<SaveItem> = pending
        .iter()
        .filter_map(|img| {
            let url = img.upload_url.clone()?;
            Some(SaveItem {
                local_id: img.local_id.clone(),
                record: NewGalleryImage {
                    project_id: project_id.to_string(),
                    image_url: url,
                    caption: img.caption.clone(),
                    display_order: img.display_order,
                    is_feature: img.is_feature,
                },
            })
        })
        .collect();
    items.sort_by_key(|item| item.record.display_order);

    let featured = persisted.iter().any(|img| img.is_feature) || items.iter().any(|item| item.record.is_feature);
    if !featured {
        if let Some(first) = items.first_mut() {
            first.record.is_feature = true;
        }
    }

    Ok(items)
}

/// Single ordered view of both collections; persisted rows first on equal order
pub fn merge_for_display(persisted: &[GalleryImage], pending: &[PendingImage]) -> Vec<GalleryEntry> {
    let mut entries: Vec<(i32, u8, GalleryEntry)> = persisted
        .iter()
        .map(|img| (img.display_order, 0, GalleryEntry::from(img)))
        .chain(pending.iter().map(|img| (img.display_order, 1, GalleryEntry::from(img))))
        .collect();
    entries.sort_by_key(|(order, rank, _)| (*order, *rank));
    entries.into_iter().map(|(_, _, entry)| entry).collect()
}

/// Renumber from a drag-and-drop result.
///
/// Listed ids get `position + 1`; anything not listed keeps its relative order
/// after them. Returns the ids of persisted rows whose order changed.
pub fn apply_ordering(
    persisted: &mut [GalleryImage],
    pending: &mut [PendingImage],
    ids: &[String],
) -> Result<Vec<String>> {
    let mut slots = Vec::with_capacity(ids.len());
    for id in ids {
        let slot = find(persisted, pending, id).ok_or_else(|| GalleryError::NotFound(id.clone()))?;
        if !slots.contains(&slot) {
            slots.push(slot);
        }
    }

    let mut rest: Vec<(i32, u8, Slot)> = persisted
        .iter()
        .enumerate()
        .map(|(idx, img)| (img.display_order, 0, Slot::Persisted(idx)))
        .chain(
            pending
                .iter()
                .enumerate()
                .map(|(idx, img)| (img.display_order, 1, Slot::Pending(idx))),
        )
        .filter(|(_, _, slot)| !slots.contains(slot))
        .collect();
    rest.sort_by_key(|(order, rank, _)| (*order, *rank));
    slots.extend(rest.into_iter().map(|(_, _, slot)| slot));

    let mut changed = Vec::new();
    for (position, slot) in slots.into_iter().enumerate() {
        let order = position as i32 + 1;
        match slot {
            Slot::Persisted(idx) => {
                let img = &mut persisted[idx];
                if img.display_order != order {
                    img.display_order = order;
                    changed.push(img.id.clone());
                }
            }
            Slot::Pending(idx) => pending[idx].display_order = order,
        }
    }
    Ok(changed)
}

fn find(persisted: &[GalleryImage], pending: &[PendingImage], id: &str) -> Option<Slot> {
    persisted
        .iter()
        .position(|img| img.id == id)
        .map(Slot::Persisted)
        .or_else(|| pending.iter().position(|img| img.local_id == id).map(Slot::Pending))
}

fn first_by_order(
    persisted: &[GalleryImage],
    pending: &[PendingImage],
    take_persisted: impl Fn(&GalleryImage) -> bool,
    take_pending: impl Fn(&PendingImage) -> bool,
) -> Option<Slot> {
    let persisted_iter = persisted
        .iter()
        .enumerate()
        .filter(|(_, img)| take_persisted(img))
        .map(|(idx, img)| ((img.display_order, 0u8), Slot::Persisted(idx)));
    let pending_iter = pending
        .iter()
        .enumerate()
        .filter(|(_, img)| take_pending(img))
        .map(|(idx, img)| ((img.display_order, 1u8), Slot::Pending(idx)));
    persisted_iter
        .chain(pending_iter)
        .min_by_key(|(key, _)| *key)
        .map(|(_, slot)| slot)
}

fn apply_feature(persisted: &mut [GalleryImage], pending: &mut [PendingImage], target: Slot) -> Vec<String> {
    let mut changed = Vec::new();
    for (idx, img) in persisted.iter_mut().enumerate() {
        let want = target == Slot::Persisted(idx);
        if img.is_feature != want {
            img.is_feature = want;
            changed.push(img.id.clone());
        }
    }
    for (idx, img) in pending.iter_mut().enumerate() {
        img.is_feature = target == Slot::Pending(idx);
    }
    changed
}
