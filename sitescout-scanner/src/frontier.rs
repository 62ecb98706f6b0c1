use crate::normalize::NormalizedUrl;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// Which pending URL is served next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueOrder {
    /// Lexicographically greatest URL first. Under a tight budget this favours
    /// paths with later dates or version numbers.
    #[default]
    LatestFirst,
    /// Discovery order.
    Fifo,
}

enum PendingQueue {
    LatestFirst(BTreeSet<NormalizedUrl>),
    Fifo(VecDeque<NormalizedUrl>),
}

/// Pending queue plus visited set for one crawl session.
///
/// A URL is admitted at most once: `push` refuses anything already pending or
/// visited, and `visited` only grows.
pub struct Frontier {
    queue: PendingQueue,
    pending: HashMap<NormalizedUrl, usize>,
    visited: HashSet<NormalizedUrl>,
}

impl Frontier {
    pub fn new(order: QueueOrder) -> Self {
        let queue = match order {
            QueueOrder::LatestFirst => PendingQueue::LatestFirst(BTreeSet::new()),
            QueueOrder::Fifo => PendingQueue::Fifo(VecDeque::new()),
        };
        Self {
            queue,
            pending: HashMap::new(),
            visited: HashSet::new(),
        }
    }

    /// Queue `url` at `depth`. Returns false if it was already seen.
    pub fn push(&mut self, url: NormalizedUrl, depth: usize) -> bool {
        if self.visited.contains(&url) || self.pending.contains_key(&url) {
            return false;
        }
        self.pending.insert(url.clone(), depth);
        match &mut self.queue {
            PendingQueue::LatestFirst(set) => {
                set.insert(url);
            }
            PendingQueue::Fifo(deque) => deque.push_back(url),
        }
        true
    }

    /// Queue a batch. FIFO keeps the batch's own order.
    pub fn extend<I: IntoIterator<Item = NormalizedUrl>>(&mut self, urls: I, depth: usize) -> usize {
        let mut added = 0;
        for url in urls {
            if self.push(url, depth) {
                added += 1;
            }
        }
        added
    }

    pub fn pop(&mut self) -> Option<(NormalizedUrl, usize)> {
        loop {
            let url = match &mut self.queue {
                PendingQueue::LatestFirst(set) => set.pop_last(),
                PendingQueue::Fifo(deque) => deque.pop_front(),
            }?;
            // Entries visited while still queued are stale
            if let Some(depth) = self.pending.remove(&url) {
                return Some((url, depth));
            }
        }
    }

    /// Returns true if the URL had not been visited before. A pending URL
    /// visited this way is withdrawn from the queue.
    pub fn mark_visited(&mut self, url: NormalizedUrl) -> bool {
        self.pending.remove(&url);
        self.visited.insert(url)
    }

    pub fn is_visited(&self, url: &NormalizedUrl) -> bool {
        self.visited.contains(url)
    }

    pub fn is_pending(&self, url: &NormalizedUrl) -> bool {
        self.pending.contains_key(url)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn into_visited(self) -> HashSet<NormalizedUrl> {
        self.visited
    }
}
