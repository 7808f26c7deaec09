//! Per-bucket record cache
//!
//! Holds at most `capacity` records. Once full, the record that has been
//! cached longest is evicted first.

use std::collections::{HashMap, VecDeque};

use crate::record::Record;

#[derive(Debug)]
pub(crate) struct RecordCache {
    capacity: usize,
    records: HashMap<u64, Record>,
    order: VecDeque<u64>,
}

impl RecordCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub(crate) fn get(&self, id: u64) -> Option<&Record> {
        self.records.get(&id)
    }

    pub(crate) fn insert(&mut self, id: u64, record: Record) {
        if self.capacity == 0 {
            return;
        }
        if self.records.insert(id, record).is_none() {
            self.order.push_back(id);
        }
        while self.records.len() > self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.records.remove(&oldest);
                }
                None => break,
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
        self.order.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}
