use arrayvec::ArrayVec;
use quickcheck_macros::quickcheck;
use std::vec::Vec;

use super::*;
use crate::utils::BoundedVec;

/// A modifying operation on `BinaryHeap`.
#[derive(Debug)]
enum Cmd {
    Push(u32),
    Pop,
}

/// Map random bytes to operations on `BinaryHeap`, never exceeding `max_len`
/// elements.
fn interpret(bytecode: &[u8], max_len: usize) -> impl Iterator<Item = Cmd> + '_ {
    let mut i = 0;
    let mut len = 0;
    std::iter::from_fn(move || {
        let instr = bytecode.get(i..i + 5)?;
        i += 5;

        let value = u32::from_le_bytes([instr[1], instr[2], instr[3], instr[4]]);

        if (instr[0] % 2 == 0 && len != max_len) || len == 0 {
            len += 1;
            Some(Cmd::Push(value))
        } else {
            len -= 1;
            Some(Cmd::Pop)
        }
    })
}

fn check_against_sorted_vec<T: BinaryHeap<Element = u32> + std::fmt::Debug>(
    mut subject: T,
    bytecode: Vec<u8>,
) {
    let mut reference = Vec::new();
    let max_len = subject.capacity();

    log::debug!("max_len = {}, bytecode len = {}", max_len, bytecode.len());

    for cmd in interpret(&bytecode, max_len) {
        log::trace!("    {:?}", cmd);
        match cmd {
            Cmd::Push(value) => {
                let i = subject.heap_push(value, ());
                log::trace!("     → {}", i);

                let i = reference.binary_search(&value).unwrap_or_else(|x| x);
                reference.insert(i, value);
            }
            Cmd::Pop => {
                let out_subject = subject.heap_pop(()).unwrap();
                log::trace!("     → {}", out_subject);
                assert_eq!(out_subject, reference.remove(0));
            }
        }
        log::trace!("[sorted: {:?}]", reference);
        log::trace!("[subject: {:?}]", subject);
        assert_eq!(subject.len(), reference.len());
        if !subject.is_empty() {
            assert_eq!(subject[0], reference[0]);
        }
    }
}

#[quickcheck]
fn arrayvec_4(bytecode: Vec<u8>) {
    check_against_sorted_vec(ArrayVec::<u32, 4>::new(), bytecode);
}

#[quickcheck]
fn arrayvec_256(bytecode: Vec<u8>) {
    check_against_sorted_vec(ArrayVec::<u32, 256>::new(), bytecode);
}

#[quickcheck]
fn bounded_vec_7(bytecode: Vec<u8>) {
    check_against_sorted_vec(BoundedVec::<u32>::try_with_capacity(7).unwrap(), bytecode);
}

#[test]
fn pops_in_ascending_order() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut v = BoundedVec::try_with_capacity(9).unwrap();
    for x in [22, 10, 17, 16, 80, 66, 39, 40, 96] {
        v.heap_push(x, ());
    }

    let mut out = Vec::new();
    while let Some(x) = v.heap_pop(()) {
        out.push(x);
    }
    assert_eq!(out, [10, 16, 17, 22, 39, 40, 66, 80, 96]);
}

/// Elements compared by `key` only; `id` tells equal-keyed elements apart.
#[derive(Debug, Clone, Copy, PartialEq)]
struct El {
    key: u32,
    id: usize,
}

struct KeyCtx;

impl BinaryHeapCtx<El> for KeyCtx {
    fn lt(&mut self, x: &El, y: &El) -> bool {
        x.key < y.key
    }
}

#[test]
fn custom_context() {
    let mut v = ArrayVec::<El, 4>::new();
    v.heap_push(El { key: 3, id: 0 }, KeyCtx);
    v.heap_push(El { key: 1, id: 1 }, KeyCtx);
    v.heap_push(El { key: 2, id: 2 }, KeyCtx);
    assert_eq!(v.heap_pop(KeyCtx).map(|e| e.id), Some(1));
    assert_eq!(v.heap_pop(KeyCtx).map(|e| e.id), Some(2));
    assert_eq!(v.heap_pop(KeyCtx).map(|e| e.id), Some(0));
    assert_eq!(v.heap_pop(KeyCtx), None);
}
