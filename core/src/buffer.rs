//! Capacity-bounded per-source log buffers.

use std::collections::{HashMap, VecDeque};

use scriptdeck_types::{BufferId, LogRecord, ScriptCatalog};

pub const DEFAULT_BUFFER_CAPACITY: usize = 200;

/// Ordered log lines for one source. Oldest lines are evicted first once
/// the buffer is full.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    records: VecDeque<LogRecord>,
    capacity: usize,
}

impl LogBuffer {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, record: LogRecord) {
        self.records.push_back(record);
        while self.records.len() > self.capacity {
            self.records.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn last(&self) -> Option<&LogRecord> {
        self.records.back()
    }

    pub fn iter(&self) -> std::collections::vec_deque::Iter<'_, LogRecord> {
        self.records.iter()
    }
}

impl<'a> IntoIterator for &'a LogBuffer {
    type Item = &'a LogRecord;
    type IntoIter = std::collections::vec_deque::Iter<'a, LogRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// What a presenter should draw for a buffer.
#[derive(Debug)]
pub enum BufferView<'a> {
    /// Nothing to show; render the empty-state placeholder.
    Empty,
    Lines(std::collections::vec_deque::Iter<'a, LogRecord>),
}

/// One buffer per known source, created up front.
#[derive(Debug, Clone)]
pub struct BufferStore {
    capacity: usize,
    buffers: HashMap<BufferId, LogBuffer>,
}

impl BufferStore {
    /// Create the system buffer and one buffer per catalog script.
    #[must_use]
    pub fn new(catalog: &ScriptCatalog, capacity: usize) -> Self {
        let mut buffers = HashMap::with_capacity(catalog.len() + 1);
        buffers.insert(BufferId::System, LogBuffer::new(capacity));
        for id in catalog.ids() {
            buffers.insert(BufferId::Script(id.clone()), LogBuffer::new(capacity));
        }
        Self { capacity, buffers }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append at the tail, evicting from the head past capacity.
    pub fn append(&mut self, id: &BufferId, record: LogRecord) {
        let capacity = self.capacity;
        self.buffers
            .entry(id.clone())
            .or_insert_with(|| LogBuffer::new(capacity))
            .push(record);
    }

    /// Empty one buffer. Returns `false` if no such buffer exists.
    pub fn clear(&mut self, id: &BufferId) -> bool {
        match self.buffers.get_mut(id) {
            Some(buffer) => {
                buffer.clear();
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn get(&self, id: &BufferId) -> Option<&LogBuffer> {
        self.buffers.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &BufferId) -> bool {
        self.buffers.contains_key(id)
    }

    #[must_use]
    pub fn view(&self, id: &BufferId) -> BufferView<'_> {
        match self.buffers.get(id) {
            Some(buffer) if !buffer.is_empty() => BufferView::Lines(buffer.iter()),
            _ => BufferView::Empty,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BufferId, &LogBuffer)> {
        self.buffers.iter()
    }
}
