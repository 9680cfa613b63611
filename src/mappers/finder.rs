//! Matching of records kept in memory, shared by file and preset mappers

use super::MapperMap;
use crate::records::Record;

/// Indexes of `known` records matching the values set in `record`
///
/// Only non-empty values of mapped keys are compared, by their text form.
/// With `use_pks` only primary keys are compared and an empty primary key
/// matches nothing. With `want_from_storage` known values which did not come
/// from storage are not compared.
pub(crate) fn find_matched(
    map: &MapperMap,
    record: &Record,
    known: &[Record],
    use_pks: bool,
    want_from_storage: bool,
) -> Vec<usize> {
    let mut candidates = vec![true; known.len()];

    for (key, _) in map.relations() {
        let is_pk = map.is_primary_key(key);
        let wanted = match record.get(key) {
            Ok(value) if !value.is_empty() => value.to_text(),
            _ => {
                if use_pks && is_pk {
                    return Vec::new();
                }
                continue;
            }
        };
        if use_pks && !is_pk {
            continue;
        }

        for (index, known_record) in known.iter().enumerate() {
            if !candidates[index] {
                continue;
            }
            let Ok(entry) = known_record.entry(key) else {
                candidates[index] = false;
                continue;
            };
            if want_from_storage && !entry.is_from_storage() {
                continue;
            }
            if entry.data().is_empty() || entry.data().to_text() != wanted {
                candidates[index] = false;
            }
        }
    }

    candidates
        .into_iter()
        .enumerate()
        .filter_map(|(index, matched)| matched.then_some(index))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::EntryType;

    fn map() -> MapperMap {
        let mut map = MapperMap::new("users.csv");
        map.set_relation("id", "0")
            .set_relation("name", "1")
            .set_relation("group", "2")
            .add_primary_key("id");
        map
    }

    fn user(id: i64, name: &str, group: i64) -> Record {
        let mut record = Record::new();
        record
            .add_entry("id", EntryType::Integer { max: 1000 })
            .unwrap()
            .add_entry("name", EntryType::String { max_length: 64 })
            .unwrap()
            .add_entry("group", EntryType::Integer { max: 10 })
            .unwrap();
        record.set("id", id).unwrap();
        record.set("name", name).unwrap();
        record.set("group", group).unwrap();
        record
    }

    fn known() -> Vec<Record> {
        vec![user(1, "ann", 1), user(2, "bob", 2), user(3, "cid", 1)]
    }

    #[test]
    fn test_match_by_values() {
        let mut wanted = user(0, "", 1);
        assert_eq!(find_matched(&map(), &wanted, &known(), false, false), vec![0, 2]);
        wanted.set("name", "cid").unwrap();
        assert_eq!(find_matched(&map(), &wanted, &known(), false, false), vec![2]);
        let empty = user(0, "", 0);
        assert_eq!(find_matched(&map(), &empty, &known(), false, false).len(), 3);
    }

    #[test]
    fn test_match_by_primary_keys() {
        let wanted = user(2, "someone else", 1);
        assert_eq!(find_matched(&map(), &wanted, &known(), true, false), vec![1]);
        let no_pk = user(0, "bob", 2);
        assert!(find_matched(&map(), &no_pk, &known(), true, false).is_empty());
    }

    #[test]
    fn test_only_stored_values_compared() {
        let mut known = known();
        known[0].entry_mut("id").unwrap().mark_from_storage(true);
        let wanted = user(5, "ann", 0);
        // only the first record has a stored id, the others are not compared at all
        assert_eq!(find_matched(&map(), &wanted, &known, false, true), vec![1, 2]);
        let wanted = user(1, "", 0);
        assert_eq!(find_matched(&map(), &wanted, &known, false, true), vec![0, 1, 2]);
    }
}
