//! # Fulfillment
//!
//! Delivery state of the physical items inside a liability. Independent of
//! payment: a paid liability can still have pending items and vice versa.
//!
//! ## Item State Machine
//! ```text
//!   ┌─────────┐  delivered (stamp at + by)   ┌───────────┐
//!   │ pending │ ───────────────────────────► │ delivered │
//!   └─────────┘ ◄─────────────────────────── └───────────┘
//!                 anything else (clear stamps)
//! ```
//!
//! The server owns the stamps. A client can say an item is delivered, but it
//! cannot choose when or by whom.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::types::{Actor, FulfillmentItem, ItemStatus, ItemUpdate};

const DELIVERED: &str = "delivered";

/// Normalises a wholesale replacement of a liability's items.
///
/// - status `"delivered"`: keeps the stored stamps when the same item was
///   already delivered, otherwise stamps `now` and the actor
/// - any other status: pending with cleared stamps
///
/// "The same item" is the stored item at the same position with the same
/// name, or, failing that, the only stored item with that name. A name that
/// appears several times is only ever matched by position.
pub fn normalize_items(
    current: &[FulfillmentItem],
    incoming: Vec<ItemUpdate>,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Vec<FulfillmentItem> {
    incoming
        .into_iter()
        .enumerate()
        .map(|(index, update)| {
            let name = update.name.trim().to_string();
            let delivered = update
                .status
                .as_deref()
                .map(|s| s.trim().eq_ignore_ascii_case(DELIVERED))
                .unwrap_or(false);

            if !delivered {
                return FulfillmentItem {
                    name,
                    price: update.price,
                    status: ItemStatus::Pending,
                    delivered_at: None,
                    delivered_by: None,
                };
            }

            let (delivered_at, delivered_by) = match previous_delivery(current, index, &name) {
                Some(prev) => (
                    prev.delivered_at.or(Some(now)),
                    prev.delivered_by.clone().or_else(|| Some(actor.name.clone())),
                ),
                None => (Some(now), Some(actor.name.clone())),
            };

            FulfillmentItem {
                name,
                price: update.price,
                status: ItemStatus::Delivered,
                delivered_at,
                delivered_by,
            }
        })
        .collect()
}

fn previous_delivery<'a>(current: &'a [FulfillmentItem], index: usize, name: &str) -> Option<&'a FulfillmentItem> {
    let same_name = |item: &&FulfillmentItem| item.name.trim() == name;

    let stored = match current.get(index).filter(same_name) {
        Some(item) => item,
        None => {
            let mut named = current.iter().filter(same_name);
            match (named.next(), named.next()) {
                (Some(only), None) => only,
                _ => return None,
            }
        }
    };

    stored.is_delivered().then_some(stored)
}

/// Marks every pending item whose name is in `names` as delivered.
/// Returns whether anything changed.
pub fn mark_delivered(
    items: &mut [FulfillmentItem],
    names: &HashSet<&str>,
    actor: &Actor,
    now: DateTime<Utc>,
) -> bool {
    let mut changed = false;
    for item in items.iter_mut() {
        if !item.is_delivered() && names.contains(item.name.trim()) {
            item.status = ItemStatus::Delivered;
            item.delivered_at = Some(now);
            item.delivered_by = Some(actor.name.clone());
            changed = true;
        }
    }
    changed
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn pending(name: &str) -> FulfillmentItem {
        FulfillmentItem {
            name: name.to_string(),
            price: None,
            status: ItemStatus::Pending,
            delivered_at: None,
            delivered_by: None,
        }
    }

    fn update(name: &str, status: Option<&str>) -> ItemUpdate {
        ItemUpdate {
            name: name.to_string(),
            price: None,
            status: status.map(str::to_string),
        }
    }

    #[test]
    fn test_delivered_gets_stamped() {
        let now = Utc::now();
        let actor = Actor::new("u1", "Bu Siti");

        let items = normalize_items(&[pending("Baju")], vec![update("Baju", Some("delivered"))], &actor, now);

        assert_eq!(items[0].status, ItemStatus::Delivered);
        assert_eq!(items[0].delivered_at, Some(now));
        assert_eq!(items[0].delivered_by.as_deref(), Some("Bu Siti"));
    }

    #[test]
    fn test_resubmission_keeps_original_stamp() {
        let first = Utc::now() - Duration::hours(3);
        let later = Utc::now();
        let actor = Actor::new("u1", "Bu Siti");

        let once = normalize_items(&[pending("Baju")], vec![update("Baju", Some("delivered"))], &actor, first);
        let twice = normalize_items(
            &once,
            vec![update("Baju", Some("delivered"))],
            &Actor::new("u2", "Pak Budi"),
            later,
        );

        assert_eq!(twice[0].delivered_at, Some(first));
        assert_eq!(twice[0].delivered_by.as_deref(), Some("Bu Siti"));
    }

    #[test]
    fn test_duplicate_names_match_by_position() {
        let first = Utc::now() - Duration::hours(1);
        let later = Utc::now();
        let siti = Actor::new("u1", "Bu Siti");
        let budi = Actor::new("u2", "Pak Budi");

        let once = normalize_items(
            &[pending("Buku"), pending("Buku")],
            vec![update("Buku", Some("delivered")), update("Buku", None)],
            &siti,
            first,
        );
        let twice = normalize_items(
            &once,
            vec![update("Buku", Some("delivered")), update("Buku", Some("delivered"))],
            &budi,
            later,
        );

        assert_eq!(twice[0].delivered_at, Some(first));
        assert_eq!(twice[0].delivered_by.as_deref(), Some("Bu Siti"));
        assert_eq!(twice[1].delivered_at, Some(later));
        assert_eq!(twice[1].delivered_by.as_deref(), Some("Pak Budi"));
    }

    #[test]
    fn test_reordered_unique_items_keep_stamps() {
        let first = Utc::now() - Duration::hours(1);
        let actor = Actor::new("u1", "Bu Siti");

        let once = normalize_items(
            &[pending("Baju"), pending("Celana")],
            vec![update("Baju", Some("delivered")), update("Celana", None)],
            &actor,
            first,
        );
        let reordered = normalize_items(
            &once,
            vec![update("Celana", None), update("Baju", Some("delivered"))],
            &Actor::new("u2", "Pak Budi"),
            Utc::now(),
        );

        assert_eq!(reordered[1].delivered_at, Some(first));
        assert_eq!(reordered[1].delivered_by.as_deref(), Some("Bu Siti"));
    }

    #[test]
    fn test_other_status_forced_pending() {
        let now = Utc::now();
        let actor = Actor::system();
        let mut delivered = pending("Baju");
        delivered.status = ItemStatus::Delivered;
        delivered.delivered_at = Some(now);
        delivered.delivered_by = Some("x".to_string());

        let items = normalize_items(
            &[delivered],
            vec![update("Baju", Some("half-delivered")), update("Celana", None)],
            &actor,
            now,
        );

        assert!(items.iter().all(|i| i.status == ItemStatus::Pending));
        assert!(items.iter().all(|i| i.delivered_at.is_none() && i.delivered_by.is_none()));
    }

    #[test]
    fn test_mark_delivered_only_touches_pending_named_items() {
        let now = Utc::now();
        let earlier = now - Duration::days(1);
        let actor = Actor::new("u1", "Bu Siti");

        let mut done = pending("Baju");
        done.status = ItemStatus::Delivered;
        done.delivered_at = Some(earlier);

        let mut items = vec![done, pending("Celana"), pending("Buku")];
        let names: HashSet<&str> = ["Baju", "Celana"].into_iter().collect();

        assert!(mark_delivered(&mut items, &names, &actor, now));
        assert_eq!(items[0].delivered_at, Some(earlier));
        assert_eq!(items[1].status, ItemStatus::Delivered);
        assert_eq!(items[2].status, ItemStatus::Pending);

        // Second pass finds nothing left to do.
        assert!(!mark_delivered(&mut items, &names, &actor, now));
    }
}
