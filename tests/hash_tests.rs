//! Integration tests for the Robin Hood hash table family

use std::rc::Rc;

use argent::hash::{FixKeyHashTable, FixKeyed, IndexHashTable, NameHashTable, PtrHashTable};
use argent::strings::VmString;

mod ptr_tables {
    use super::*;

    #[test]
    fn test_thousand_keys_ascending_and_shuffled() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut ascending = PtrHashTable::new();
        for i in 0..1000usize {
            ascending.insert(i * 16 + 8, i as u64);
        }
        assert_eq!(ascending.len(), 1000);
        assert_eq!(ascending.fsck(), 0);

        // Same keys in a scrambled order; 389 is coprime to 1000 so the
        // multiplicative walk visits every key exactly once.
        let mut shuffled = PtrHashTable::new();
        for i in 0..1000usize {
            let j = (i * 389) % 1000;
            shuffled.insert(j * 16 + 8, j as u64);
        }
        assert_eq!(shuffled.len(), 1000);
        assert_eq!(shuffled.fsck(), 0);

        for i in 0..1000usize {
            assert_eq!(ascending.fetch(i * 16 + 8), Some(i as u64));
            assert_eq!(shuffled.fetch(i * 16 + 8), Some(i as u64));
        }

        // Re-inserting the whole keyset with unchanged values is a no-op.
        for i in 0..1000usize {
            ascending.insert(i * 16 + 8, i as u64);
        }
        assert_eq!(ascending.len(), 1000);
    }

    #[test]
    fn test_delete_keeps_remaining_keys_fetchable() {
        let mut table = PtrHashTable::new();
        for i in 0..200usize {
            table.insert(i + 1, (i + 1) as u64);
        }
        for victim in [1usize, 50, 99, 100, 200] {
            assert_eq!(table.fetch_and_delete(victim), Some(victim as u64));
        }
        assert_eq!(table.len(), 195);
        assert_eq!(table.fsck(), 0);
        for i in 1..=200usize {
            let expected = if [1usize, 50, 99, 100, 200].contains(&i) {
                None
            } else {
                Some(i as u64)
            };
            assert_eq!(table.fetch(i), expected);
        }
    }

    #[test]
    fn test_lookup_completeness_through_growth() {
        // Every key reported fresh must remain fetchable across grows.
        let mut table = PtrHashTable::new();
        for i in 0..5000usize {
            *table.lvalue_fetch(i * 8) = i as u64 + 1;
        }
        assert_eq!(table.len(), 5000);
        for i in 0..5000usize {
            assert_eq!(table.fetch(i * 8), Some(i as u64 + 1));
        }
        assert_eq!(table.fsck(), 0);
    }

    #[test]
    fn test_object_handles_as_keys() {
        let mut heap = argent::heap::Heap::new();
        let mut table = PtrHashTable::new();
        let objs: Vec<_> = (0..100).map(|_| heap.alloc_plain()).collect();
        for (i, &obj) in objs.iter().enumerate() {
            table.insert(obj, i as u64);
        }
        assert_eq!(table.len(), 100);
        assert_eq!(table.fsck(), 0);
        for (i, &obj) in objs.iter().enumerate() {
            assert_eq!(table.fetch(obj), Some(i as u64));
        }
    }

    #[test]
    fn test_delete_then_reinsert_cycles() {
        let mut table = PtrHashTable::new();
        for round in 0..10u64 {
            for i in 0..64usize {
                table.insert(i + 1, i as u64 + round * 100);
            }
            assert_eq!(table.fsck(), 0);
            for i in 0..64usize {
                assert_eq!(table.fetch_and_delete(i + 1), Some(i as u64 + round * 100));
            }
            assert!(table.is_empty());
        }
    }
}

mod name_tables {
    use super::*;

    #[test]
    fn test_grow_preserves_names_and_values() {
        let mut table = NameHashTable::new();
        for i in 0..1000i64 {
            table.insert(&format!("symbol-{}", i), i);
        }
        assert_eq!(table.len(), 1000);
        assert_eq!(table.fsck(), 0);
        for i in 0..1000i64 {
            assert_eq!(table.fetch(&format!("symbol-{}", i)), Some(i));
        }
        assert_eq!(table.fetch("symbol-1000"), None);
    }

    #[test]
    fn test_presized_table_matches_grown_table() {
        let mut grown = NameHashTable::new();
        let mut presized = NameHashTable::with_capacity(300);
        for i in 0..300i64 {
            grown.insert(&format!("k{}", i), i * 7);
            presized.insert(&format!("k{}", i), i * 7);
        }
        for i in 0..300i64 {
            let key = format!("k{}", i);
            assert_eq!(grown.fetch(&key), presized.fetch(&key));
        }
        assert_eq!(grown.fsck(), 0);
        assert_eq!(presized.fsck(), 0);
    }
}

mod index_tables {
    use super::*;

    #[test]
    fn test_interned_list_scenario() {
        let list: Vec<Rc<VmString>> = ["foo", "bar", "baz"]
            .iter()
            .map(|s| Rc::new(VmString::new(s)))
            .collect();
        let mut table = IndexHashTable::new();
        for index in 0..3 {
            table.insert(&list, index);
        }
        assert_eq!(table.fetch(&list, &VmString::new("bar")), Some(1));
        assert_eq!(table.fetch(&list, &VmString::new("qux")), None);
        assert_eq!(table.fsck(&list), 0);
    }

    #[test]
    fn test_with_capacity_build() {
        let strings: Vec<String> = (0..64).map(|i| format!("entry-{}", i)).collect();
        let list: Vec<Rc<VmString>> = strings
            .iter()
            .map(|s| Rc::new(VmString::new(s)))
            .collect();
        let mut table = IndexHashTable::with_capacity(64);
        assert!(table.built());
        for index in 0..64 {
            table.insert(&list, index);
        }
        for (index, s) in strings.iter().enumerate() {
            assert_eq!(table.fetch(&list, &VmString::new(s)), Some(index as u32));
        }
        assert_eq!(table.fsck(&list), 0);
    }
}

mod fixkey_tables {
    use super::*;

    #[derive(Default)]
    struct MethodInfo {
        key: Option<Rc<VmString>>,
        bytecode_size: u32,
    }

    impl FixKeyed for MethodInfo {
        fn key(&self) -> Option<&Rc<VmString>> {
            self.key.as_ref()
        }
    }

    #[test]
    fn test_fill_in_the_fresh_key_contract() {
        let mut table: FixKeyHashTable<MethodInfo> = FixKeyHashTable::new();
        let name = Rc::new(VmString::new("accept"));

        let payload = table.lvalue_fetch(&name);
        assert!(payload.key().is_none(), "fresh payload must arrive unkeyed");
        payload.key = Some(Rc::clone(&name));
        payload.bytecode_size = 640;

        assert_eq!(table.fetch(&name).unwrap().bytecode_size, 640);
    }

    #[test]
    fn test_grow_keeps_every_payload() {
        let mut table: FixKeyHashTable<MethodInfo> = FixKeyHashTable::new();
        let names: Vec<Rc<VmString>> = (0..500)
            .map(|i| Rc::new(VmString::new(&format!("method-{}", i))))
            .collect();
        for (i, name) in names.iter().enumerate() {
            let payload = table.lvalue_fetch(name);
            payload.key = Some(Rc::clone(name));
            payload.bytecode_size = i as u32;
        }
        assert_eq!(table.len(), 500);
        for (i, name) in names.iter().enumerate() {
            assert_eq!(table.fetch(name).unwrap().bytecode_size, i as u32);
        }
    }
}
