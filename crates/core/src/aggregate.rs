use std::collections::BTreeMap;

use crate::domain::{AggregatedRow, OrderItem};

/// Lower-cases and collapses internal whitespace so that "Rice ", "rice" and
/// " RICE" all land in the same bucket.
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Units normalize like names; an empty or omitted unit is its own bucket.
pub fn normalize_unit(raw: Option<&str>) -> Option<String> {
    let normalized = normalize_name(raw?);
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// Merges order items across messages into deterministic report rows.
///
/// Rows merge on the normalized `(name, unit)` key. Differing units never
/// sum; they stay separate rows. Quantities sum only when both sides are
/// present: a missing quantity on either side poisons the merged total to
/// `None`, because a default count cannot be assumed. Requesters accumulate
/// distinct, in first-seen order. Output is sorted by name, then unit.
pub fn aggregate(items: impl IntoIterator<Item = OrderItem>) -> Vec<AggregatedRow> {
    let mut rows: BTreeMap<(String, Option<String>), AggregatedRow> = BTreeMap::new();

    for item in items {
        let name = normalize_name(&item.name);
        if name.is_empty() {
            continue;
        }
        let unit = normalize_unit(item.unit.as_deref());

        match rows.entry((name.clone(), unit.clone())) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(AggregatedRow {
                    name,
                    total_quantity: item.quantity,
                    unit,
                    requesters: vec![item.requester],
                });
            }
            std::collections::btree_map::Entry::Occupied(mut slot) => {
                let row = slot.get_mut();
                row.total_quantity = match (row.total_quantity, item.quantity) {
                    (Some(acc), Some(quantity)) => Some(acc + quantity),
                    _ => None,
                };
                if !row.requesters.contains(&item.requester) {
                    row.requesters.push(item.requester);
                }
            }
        }
    }

    rows.into_values().collect()
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{aggregate, normalize_name, normalize_unit};
    use crate::domain::OrderItem;

    fn item(
        name: &str,
        quantity: Option<i64>,
        unit: Option<&str>,
        requester: &str,
    ) -> OrderItem {
        OrderItem {
            name: name.to_owned(),
            quantity: quantity.map(Decimal::from),
            unit: unit.map(str::to_owned),
            requester: requester.to_owned(),
            source_message_id: "1725000000.000100".to_owned(),
        }
    }

    #[test]
    fn normalization_collapses_case_and_whitespace() {
        assert_eq!(normalize_name("  Brown   Rice "), "brown rice");
        assert_eq!(normalize_unit(Some(" Bags ")), Some("bags".to_owned()));
        assert_eq!(normalize_unit(Some("   ")), None);
        assert_eq!(normalize_unit(None), None);
    }

    #[test]
    fn merges_matching_items_across_messages() {
        let rows = aggregate(vec![
            item("rice", Some(2), Some("bags"), "userA"),
            item("Rice", Some(3), Some("Bags"), "userB"),
        ]);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "rice");
        assert_eq!(rows[0].total_quantity, Some(Decimal::from(5)));
        assert_eq!(rows[0].unit.as_deref(), Some("bags"));
        assert_eq!(rows[0].requesters, vec!["userA", "userB"]);
    }

    #[test]
    fn missing_quantity_poisons_the_merged_total() {
        let rows = aggregate(vec![
            item("coffee", Some(2), Some("bags"), "userA"),
            item("coffee", None, Some("bags"), "userB"),
        ]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_quantity, None);

        // Poisoning is order-independent.
        let rows = aggregate(vec![
            item("coffee", None, Some("bags"), "userB"),
            item("coffee", Some(2), Some("bags"), "userA"),
        ]);
        assert_eq!(rows[0].total_quantity, None);
    }

    #[test]
    fn differing_units_stay_separate_rows() {
        let rows = aggregate(vec![
            item("sugar", Some(2), Some("boxes"), "userA"),
            item("sugar", Some(3), Some("bags"), "userB"),
        ]);

        assert_eq!(rows.len(), 2);
        // Secondary sort by unit keeps the output stable.
        assert_eq!(rows[0].unit.as_deref(), Some("bags"));
        assert_eq!(rows[1].unit.as_deref(), Some("boxes"));
        assert_eq!(rows[0].total_quantity, Some(Decimal::from(3)));
        assert_eq!(rows[1].total_quantity, Some(Decimal::from(2)));
    }

    #[test]
    fn duplicate_requesters_are_recorded_once() {
        let rows = aggregate(vec![
            item("milk", Some(1), None, "userA"),
            item("milk", Some(1), None, "userA"),
        ]);
        assert_eq!(rows[0].requesters, vec!["userA"]);
        assert_eq!(rows[0].total_quantity, Some(Decimal::from(2)));
    }

    #[test]
    fn empty_named_items_are_dropped() {
        let rows = aggregate(vec![item("   ", Some(1), None, "userA")]);
        assert!(rows.is_empty());
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(aggregate(Vec::new()).is_empty());
    }

    #[test]
    fn permutations_yield_identical_rows() {
        let fixture = [
            item("rice", Some(2), Some("bags"), "userA"),
            item("rice", Some(3), Some("bags"), "userB"),
            item("olive oil", None, Some("bottles"), "userC"),
            item("rice", Some(1), Some("boxes"), "userA"),
            item("salt", Some(4), None, "userB"),
        ];

        let baseline = canonical(aggregate(fixture.to_vec()));
        for permutation in permutations(&fixture) {
            assert_eq!(canonical(aggregate(permutation)), baseline);
        }
    }

    // Row order, keys, and quantities are permutation-invariant; requester
    // lists keep first-seen order, so they are compared as sorted sets here.
    fn canonical(
        rows: Vec<crate::domain::AggregatedRow>,
    ) -> Vec<(String, Option<String>, Option<Decimal>, Vec<String>)> {
        rows.into_iter()
            .map(|row| {
                let mut requesters = row.requesters;
                requesters.sort();
                (row.name, row.unit, row.total_quantity, requesters)
            })
            .collect()
    }

    fn permutations(items: &[OrderItem]) -> Vec<Vec<OrderItem>> {
        if items.len() <= 1 {
            return vec![items.to_vec()];
        }
        let mut output = Vec::new();
        for index in 0..items.len() {
            let mut rest = items.to_vec();
            let chosen = rest.remove(index);
            for mut tail in permutations(&rest) {
                tail.insert(0, chosen.clone());
                output.push(tail);
            }
        }
        output
    }
}
