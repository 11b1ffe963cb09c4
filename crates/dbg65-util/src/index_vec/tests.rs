//! Tests for the IndexVec module.

use super::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct TestId(u32);

impl Idx for TestId {
    fn from_usize(idx: usize) -> Self {
        assert!(idx <= u32::MAX as usize);
        TestId(idx as u32)
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

#[test]
fn test_new_and_empty() {
    let vec: IndexVec<TestId, i32> = IndexVec::new();
    assert!(vec.is_empty());
    assert_eq!(vec.len(), 0);
}

#[test]
fn test_with_capacity() {
    let vec: IndexVec<TestId, i32> = IndexVec::with_capacity(10);
    assert!(vec.is_empty());
    assert!(vec.capacity() >= 10);
}

#[test]
fn test_push_and_index() {
    let mut vec: IndexVec<TestId, i32> = IndexVec::new();
    let a = vec.push(10);
    let b = vec.push(20);
    let c = vec.push(30);

    assert_eq!(vec[a], 10);
    assert_eq!(vec[b], 20);
    assert_eq!(vec[c], 30);
    assert_eq!(vec.len(), 3);
    assert_eq!(a, TestId(0));
    assert_eq!(c, TestId(2));
}

#[test]
fn test_get_in_and_out_of_bounds() {
    let mut vec: IndexVec<TestId, i32> = IndexVec::new();
    vec.push(1);
    assert_eq!(vec.get(TestId(0)), Some(&1));
    assert_eq!(vec.get(TestId(1)), None);
}

#[test]
fn test_get_mut() {
    let mut vec: IndexVec<TestId, i32> = IndexVec::new();
    let id = vec.push(1);
    *vec.get_mut(id).unwrap() = 99;
    assert_eq!(vec[id], 99);
}

#[test]
fn test_iter_enumerated() {
    let mut vec: IndexVec<TestId, &str> = IndexVec::new();
    vec.push("a");
    vec.push("b");

    let pairs: Vec<_> = vec.iter_enumerated().collect();
    assert_eq!(pairs, vec![(TestId(0), &"a"), (TestId(1), &"b")]);
}

#[test]
fn test_indices() {
    let mut vec: IndexVec<TestId, i32> = IndexVec::new();
    vec.push(1);
    vec.push(2);
    let ids: Vec<_> = vec.indices().collect();
    assert_eq!(ids, vec![TestId(0), TestId(1)]);
}

#[test]
fn test_into_iter_enumerated() {
    let mut vec: IndexVec<TestId, i32> = IndexVec::new();
    vec.push(10);
    vec.push(20);
    let sum: i32 = vec.into_iter_enumerated().map(|(_, v)| v).sum();
    assert_eq!(sum, 30);
}

#[test]
fn test_insert_expand_fills_holes() {
    let mut vec: IndexVec<TestId, Option<i32>> = IndexVec::new();
    vec.insert_expand(TestId(3), 33);
    assert_eq!(vec.len(), 4);
    assert_eq!(vec[TestId(0)], None);
    assert_eq!(vec[TestId(1)], None);
    assert_eq!(vec[TestId(2)], None);
    assert_eq!(vec[TestId(3)], Some(33));

    vec.insert_expand(TestId(1), 11);
    assert_eq!(vec.len(), 4);
    assert_eq!(vec[TestId(1)], Some(11));
}

#[test]
fn test_insert_expand_replaces() {
    let mut vec: IndexVec<TestId, Option<i32>> = IndexVec::new();
    vec.insert_expand(TestId(0), 1);
    vec.insert_expand(TestId(0), 2);
    assert_eq!(vec.len(), 1);
    assert_eq!(vec[TestId(0)], Some(2));
}

#[test]
fn test_equality() {
    let mut a: IndexVec<TestId, i32> = IndexVec::new();
    let mut b: IndexVec<TestId, i32> = IndexVec::new();
    a.push(1);
    b.push(1);
    assert_eq!(a, b);
    b.push(2);
    assert_ne!(a, b);
}

#[test]
fn test_as_slice_and_iter() {
    let mut vec: IndexVec<TestId, i32> = IndexVec::new();
    vec.push(5);
    vec.push(6);
    assert_eq!(vec.as_slice(), &[5, 6]);
    assert_eq!(vec.iter().copied().collect::<Vec<_>>(), vec![5, 6]);
}

#[test]
fn test_define_idx_macro() {
    crate::define_idx!(MacroId);
    let mut vec: IndexVec<MacroId, i32> = IndexVec::new();
    let id = vec.push(42);
    assert_eq!(id, MacroId(0));
    assert_eq!(vec[id], 42);
}
